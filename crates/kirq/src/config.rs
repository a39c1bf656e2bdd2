//! Registry construction parameters.

/// How [`Registry::save_and_disable`](crate::Registry::save_and_disable) and
/// [`Registry::restore`](crate::Registry::restore) track the masked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    /// A single enabled/disabled bit.
    ///
    /// The first `restore` after any number of `save_and_disable` calls
    /// unmasks interrupts. Nested critical sections from unrelated call sites
    /// therefore re-enable delivery early; callers must not nest.
    #[default]
    Flag,
    /// A nesting depth. Interrupts are unmasked only when the outermost
    /// critical section is restored.
    Nested,
}

/// Construction parameters for a [`Registry`](crate::Registry).
///
/// The capacity bounds stand in for a bounded kernel heap: once reached,
/// registration fails with [`IrqError::OutOfMemory`](crate::IrqError::OutOfMemory)
/// exactly as it would on allocator exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of interrupt lines with at least one handler.
    pub max_lines: usize,
    /// Maximum number of handler entries across all lines.
    pub max_handlers: usize,
    pub mask_mode: MaskMode,
}

impl RegistryConfig {
    /// Unbounded capacities, single-bit masking.
    pub const fn new() -> Self {
        Self {
            max_lines: usize::MAX,
            max_handlers: usize::MAX,
            mask_mode: MaskMode::Flag,
        }
    }

    pub const fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub const fn with_max_handlers(mut self, max_handlers: usize) -> Self {
        self.max_handlers = max_handlers;
        self
    }

    pub const fn with_mask_mode(mut self, mask_mode: MaskMode) -> Self {
        self.mask_mode = mask_mode;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}
