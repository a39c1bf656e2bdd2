//! Handler callables and the identity tokens that key registrations.

use alloc::sync::Arc;
use core::fmt;
use core::num::NonZeroUsize;

/// Code run when an interrupt line fires.
///
/// Called synchronously from interrupt context with the fired vector and the
/// driver token supplied at registration. It must not block.
pub trait IrqHandler: Send + Sync {
    fn handle(&self, vector: u32, driver: DriverId);
}

impl<F> IrqHandler for F
where
    F: Fn(u32, DriverId) + Send + Sync,
{
    fn handle(&self, vector: u32, driver: DriverId) {
        self(vector, driver)
    }
}

/// Plain interrupt service routine.
pub type IsrFn = fn(u32, DriverId);

/// Reference to a registered handler.
///
/// Equality decides what [`Filter::with_handler`] removes:
/// - handlers made with [`Handler::from_fn`] are equal when they wrap the
///   same function, however many times they were built;
/// - handlers made with [`Handler::new`] are equal only to clones of
///   themselves, since closures have no stable identity.
#[derive(Clone)]
pub struct Handler(Repr);

#[derive(Clone)]
enum Repr {
    Fn(IsrFn),
    Shared(Arc<dyn IrqHandler>),
}

impl Handler {
    pub fn new(handler: impl IrqHandler + 'static) -> Self {
        Self(Repr::Shared(Arc::new(handler)))
    }

    pub const fn from_fn(isr: IsrFn) -> Self {
        Self(Repr::Fn(isr))
    }

    #[inline]
    pub(crate) fn call(&self, vector: u32, driver: DriverId) {
        match &self.0 {
            Repr::Fn(isr) => isr(vector, driver),
            Repr::Shared(handler) => handler.handle(vector, driver),
        }
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Repr::Fn(a), Repr::Fn(b)) => core::ptr::fn_addr_eq(*a, *b),
            (Repr::Shared(a), Repr::Shared(b)) => {
                core::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Fn(isr) => write!(f, "Handler(fn {:p})", *isr),
            Repr::Shared(handler) => write!(f, "Handler({:p})", Arc::as_ptr(handler)),
        }
    }
}

/// Opaque token identifying the driver that owns a registration.
///
/// Never null. Firmware conventionally passes the address of the driver's
/// state; [`DriverId::from_ref`] does exactly that.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverId(NonZeroUsize);

impl DriverId {
    /// Wraps a raw token. Returns `None` for zero.
    pub const fn new(raw: usize) -> Option<Self> {
        match NonZeroUsize::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    pub fn from_ref<T>(driver: &'static T) -> Self {
        Self(NonZeroUsize::new(driver as *const T as usize).unwrap_or(NonZeroUsize::MIN))
    }

    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DriverId({:#x})", self.0.get())
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// Opaque reference to the device a handler serves.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(NonZeroUsize);

impl DeviceId {
    /// Wraps a raw token. Returns `None` for zero.
    pub const fn new(raw: usize) -> Option<Self> {
        match NonZeroUsize::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    pub fn from_ref<T>(device: &'static T) -> Self {
        Self(NonZeroUsize::new(device as *const T as usize).unwrap_or(NonZeroUsize::MIN))
    }

    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({:#x})", self.0.get())
    }
}

/// Selects registrations for [`Registry::unregister`](crate::Registry::unregister).
///
/// An unset field matches any value, so `Filter::any().with_driver(d)`
/// removes every handler of driver `d` on the line regardless of handler or
/// device.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    handler: Option<Handler>,
    device: Option<DeviceId>,
    driver: Option<DriverId>,
}

impl Filter {
    /// Matches every registration on the line.
    pub fn any() -> Self {
        Self::default()
    }

    /// Builds a filter from optional parts, in the order firmware APIs take them.
    pub fn from_parts(
        handler: Option<&Handler>,
        device: Option<DeviceId>,
        driver: Option<DriverId>,
    ) -> Self {
        Self {
            handler: handler.cloned(),
            device,
            driver,
        }
    }

    /// Restricts the filter to one handler, compared as described on
    /// [`Handler`].
    pub fn with_handler(mut self, handler: &Handler) -> Self {
        self.handler = Some(handler.clone());
        self
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_driver(mut self, driver: DriverId) -> Self {
        self.driver = Some(driver);
        self
    }

    pub(crate) fn matches(&self, handler: &Handler, device: Option<DeviceId>, driver: DriverId) -> bool {
        self.handler.as_ref().is_none_or(|h| h == handler)
            && self.driver.is_none_or(|d| d == driver)
            && self.device.is_none_or(|d| Some(d) == device)
    }
}
