//! Process-wide registry for firmware entry points.
//!
//! Trap vectors and C-style driver glue cannot carry a `&Registry`, so the
//! kernel installs one instance here during bring-up. Everything else should
//! prefer an explicitly passed [`Registry`].
//!
//! The instance is created once and lives for the rest of the program; there
//! is no global teardown.

use spin::Once;

use crate::config::RegistryConfig;
use crate::error::IrqError;
use crate::handler::{DeviceId, DriverId, Filter, Handler};
use crate::mask::IrqFlags;
use crate::platform::Platform;
use crate::registry::Registry;

/// Registry type used for the process-wide instance.
pub type GlobalRegistry = Registry<&'static dyn Platform>;

static REGISTRY: Once<GlobalRegistry> = Once::new();

/// Installs the process-wide registry. Later calls return the existing
/// instance and ignore their arguments.
pub fn init(platform: &'static dyn Platform, config: RegistryConfig) -> &'static GlobalRegistry {
    if let Some(registry) = REGISTRY.get() {
        log::warn!("irq registry: already initialised");
        return registry;
    }
    REGISTRY.call_once(|| Registry::new(platform, config))
}

pub fn get() -> Option<&'static GlobalRegistry> {
    REGISTRY.get()
}

fn registry() -> Result<&'static GlobalRegistry, IrqError> {
    REGISTRY.get().ok_or(IrqError::Uninitialized)
}

pub fn register(
    irq: i32,
    handler: Handler,
    device: Option<DeviceId>,
    driver: DriverId,
) -> Result<(), IrqError> {
    registry()?.register(irq, handler, device, driver)
}

pub fn unregister(irq: i32, filter: &Filter) -> Result<usize, IrqError> {
    registry()?.unregister(irq, filter)
}

/// Trap-path entry point. Ignored before [`init`].
pub fn dispatch(vector: u32) {
    if let Some(registry) = REGISTRY.get() {
        registry.dispatch(vector);
    }
}

/// Masks interrupt delivery. Before [`init`] there is no platform to call,
/// so this is a no-op returning empty flags.
pub fn save_and_disable() -> IrqFlags {
    match REGISTRY.get() {
        Some(registry) => registry.save_and_disable(),
        None => IrqFlags::EMPTY,
    }
}

pub fn restore(flags: IrqFlags) {
    if let Some(registry) = REGISTRY.get() {
        registry.restore(flags);
    }
}

pub fn enable(vector: u32) {
    if let Some(registry) = REGISTRY.get() {
        registry.enable(vector);
    }
}

pub fn disable(vector: u32) {
    if let Some(registry) = REGISTRY.get() {
        registry.disable(vector);
    }
}
