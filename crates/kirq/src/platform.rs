//! Architecture operations the registry consumes.

/// Low-level interrupt control supplied by the target platform.
///
/// Implementations must be callable from both thread and interrupt context;
/// none of these operations may block.
pub trait Platform: Sync {
    /// Disables interrupt delivery on the current core.
    fn mask_all(&self);

    /// Re-enables interrupt delivery on the current core.
    fn unmask_all(&self);

    /// Whether delivery is currently enabled on the calling core. This is
    /// the hardware state, not the registry's save/restore bookkeeping.
    fn local_enabled(&self) -> bool;

    /// Unmasks one interrupt line at the controller.
    fn enable_line(&self, vector: u32);

    /// Masks one interrupt line at the controller.
    fn disable_line(&self, vector: u32);
}

impl<P: Platform + ?Sized> Platform for &P {
    #[inline]
    fn mask_all(&self) {
        (**self).mask_all()
    }

    #[inline]
    fn unmask_all(&self) {
        (**self).unmask_all()
    }

    #[inline]
    fn local_enabled(&self) -> bool {
        (**self).local_enabled()
    }

    #[inline]
    fn enable_line(&self, vector: u32) {
        (**self).enable_line(vector)
    }

    #[inline]
    fn disable_line(&self, vector: u32) {
        (**self).disable_line(vector)
    }
}
