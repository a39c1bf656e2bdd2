//! Status results reported by the registry.

/// Why a registry operation was refused.
///
/// Every failure is reported synchronously and leaves the registry exactly as
/// it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IrqError {
    /// The interrupt number was negative.
    #[error("irq {0} needs to be a non-negative number")]
    InvalidIrq(i32),
    /// The line already carries a handler for this driver and device.
    #[error("irq {irq} already registered for this driver, will not register again")]
    AlreadyRegistered { irq: u32 },
    /// No storage was left for a handler entry or line descriptor.
    #[error("irq {irq}: cannot allocate registry storage")]
    OutOfMemory { irq: u32 },
    /// The line has no registrations, or none matched the filter.
    #[error("irq {irq}: no matching registration")]
    NotFound { irq: u32 },
    /// The process-wide registry was used before `global::init`.
    #[error("interrupt registry is not initialised")]
    Uninitialized,
}

const EINVAL: i32 = 22;
const EEXIST: i32 = 17;
const ENOMEM: i32 = 12;
const ENOENT: i32 = 2;
const ENODEV: i32 = 19;

impl IrqError {
    /// Negative errno equivalent, for callers that speak firmware status codes.
    pub const fn errno(&self) -> i32 {
        match self {
            IrqError::InvalidIrq(_) => -EINVAL,
            IrqError::AlreadyRegistered { .. } => -EEXIST,
            IrqError::OutOfMemory { .. } => -ENOMEM,
            IrqError::NotFound { .. } => -ENOENT,
            IrqError::Uninitialized => -ENODEV,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn errno_values_are_negative() {
        assert_eq!(IrqError::InvalidIrq(-1).errno(), -22);
        assert_eq!(IrqError::AlreadyRegistered { irq: 3 }.errno(), -17);
        assert_eq!(IrqError::OutOfMemory { irq: 3 }.errno(), -12);
        assert_eq!(IrqError::NotFound { irq: 3 }.errno(), -2);
    }

    #[test]
    fn messages_name_the_line() {
        assert_eq!(
            IrqError::InvalidIrq(-4).to_string(),
            "irq -4 needs to be a non-negative number"
        );
        assert_eq!(
            IrqError::NotFound { irq: 9 }.to_string(),
            "irq 9: no matching registration"
        );
    }
}
