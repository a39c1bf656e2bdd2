// =============================================================================
// kirq: Interrupt Mask Save/Restore
// =============================================================================
//
// Short atomic sections against interrupt delivery, used by the registry
// around every link/unlink step and exported to drivers.
//
// TWO MODES (see `MaskMode`):
//   Flag:    one enabled/disabled bit. `save_and_disable` masks only when the
//            bit says enabled; `restore` unmasks only when it says disabled.
//            The token is not inspected, so two nested sections followed by
//            one restore re-enable delivery early. Callers must not nest.
//   Nested:  a depth counter. Delivery is unmasked when the outermost section
//            is restored; the token carries the depth that was current at
//            save time.
//
// The state starts out "enabled": the registry is constructed from thread
// context with interrupts running.
//
// The registry's own link/unlink steps do NOT go through this state. They
// use `LocalMask`, which consults the calling core's real interrupt flag:
// another core's open section must neither leave the writer's core unmasked
// while it holds the table exclusively, nor be ended by the writer.
// =============================================================================

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::MaskMode;
use crate::platform::Platform;

/// Token returned by `save_and_disable` and handed back to `restore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "pass the flags back to `restore`"]
pub struct IrqFlags(u32);

impl IrqFlags {
    pub const EMPTY: Self = Self(0);

    /// Nesting depth observed when the section was entered. Always zero in
    /// [`MaskMode::Flag`].
    pub const fn depth(self) -> u32 {
        self.0
    }
}

pub(crate) struct MaskState {
    mode: MaskMode,
    /// Whether delivery is currently believed to be enabled.
    enabled: AtomicBool,
    /// Open critical sections; only maintained in `MaskMode::Nested`.
    depth: AtomicU32,
}

impl MaskState {
    pub(crate) const fn new(mode: MaskMode) -> Self {
        Self {
            mode,
            enabled: AtomicBool::new(true),
            depth: AtomicU32::new(0),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn save_and_disable<P: Platform + ?Sized>(&self, platform: &P) -> IrqFlags {
        match self.mode {
            MaskMode::Flag => {
                if self.enabled.load(Ordering::Acquire) {
                    platform.mask_all();
                    self.enabled.store(false, Ordering::Release);
                }
                IrqFlags(0)
            }
            MaskMode::Nested => {
                let depth = self.depth.fetch_add(1, Ordering::AcqRel);
                if depth == 0 {
                    platform.mask_all();
                    self.enabled.store(false, Ordering::Release);
                }
                IrqFlags(depth)
            }
        }
    }

    pub(crate) fn restore<P: Platform + ?Sized>(&self, platform: &P, flags: IrqFlags) {
        match self.mode {
            MaskMode::Flag => {
                let _ = flags;
                if !self.enabled.load(Ordering::Acquire) {
                    platform.unmask_all();
                    self.enabled.store(true, Ordering::Release);
                }
            }
            MaskMode::Nested => {
                match self
                    .depth
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| d.checked_sub(1))
                {
                    Ok(1) => {
                        self.enabled.store(true, Ordering::Release);
                        platform.unmask_all();
                    }
                    Ok(depth) => {
                        if depth - 1 != flags.0 {
                            log::warn!(
                                "irq restore out of order: depth {} closed with flags {}",
                                depth,
                                flags.0
                            );
                        }
                    }
                    Err(_) => log::warn!("irq restore without a matching save"),
                }
            }
        }
    }
}

/// RAII critical section: interrupts are masked while the guard lives.
///
/// Obtained from [`Registry::masked`](crate::Registry::masked). Dropping the
/// guard performs the matching `restore`.
#[must_use = "interrupts are unmasked again as soon as the guard is dropped"]
pub struct MaskGuard<'a, P: Platform + ?Sized> {
    state: &'a MaskState,
    platform: &'a P,
    flags: IrqFlags,
}

impl<'a, P: Platform + ?Sized> MaskGuard<'a, P> {
    pub(crate) fn new(state: &'a MaskState, platform: &'a P) -> Self {
        let flags = state.save_and_disable(platform);
        Self {
            state,
            platform,
            flags,
        }
    }

    pub fn flags(&self) -> IrqFlags {
        self.flags
    }
}

impl<P: Platform + ?Sized> Drop for MaskGuard<'_, P> {
    fn drop(&mut self) {
        self.state.restore(self.platform, self.flags);
    }
}

/// Masks delivery on the calling core for one structural step, restoring
/// the core's previous state on drop. Independent of [`MaskState`].
pub(crate) struct LocalMask<'a, P: Platform + ?Sized> {
    platform: &'a P,
    was_enabled: bool,
}

impl<'a, P: Platform + ?Sized> LocalMask<'a, P> {
    pub(crate) fn new(platform: &'a P) -> Self {
        let was_enabled = platform.local_enabled();
        if was_enabled {
            platform.mask_all();
        }
        Self {
            platform,
            was_enabled,
        }
    }
}

impl<P: Platform + ?Sized> Drop for LocalMask<'_, P> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.platform.unmask_all();
        }
    }
}
