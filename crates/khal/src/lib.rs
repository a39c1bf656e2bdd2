//! x86_64 backend for the kirq interrupt registry.
//!
//! Provides the [`kirq::Platform`] implementation for PC hardware, a COM1
//! log sink for [`klog`], and the glue a kernel needs to bring both up and
//! route trap vectors into the registry.
#![cfg_attr(not(test), no_std)]

pub mod ioapic;
pub mod pic;
pub mod platform;
pub mod serial;

pub use platform::{Controller, X86Platform};
pub use serial::SerialSink;

use kirq::global::GlobalRegistry;
use kirq::RegistryConfig;
use log::{LevelFilter, SetLoggerError};
use spin::Once;

static SERIAL: SerialSink = SerialSink::com1();
static LOGGER: klog::Logger<&SerialSink> = klog::Logger::new(&SERIAL, LevelFilter::Debug);

static PLATFORM: Once<&'static X86Platform> = Once::new();

/// Brings up COM1 and installs it as the `log` backend.
///
/// # Safety
///
/// Nothing else may drive the COM1 ports.
pub unsafe fn init_logging() -> Result<(), SetLoggerError> {
    let loopback_ok = unsafe { SERIAL.init() };
    klog::init(&LOGGER)?;
    if !loopback_ok {
        log::warn!("serial: loopback test failed, output may be lost");
    }
    Ok(())
}

/// Installs the process-wide registry on top of `platform`.
///
/// The controller must already be initialised with every line masked.
pub fn install(platform: &'static X86Platform, config: RegistryConfig) -> &'static GlobalRegistry {
    PLATFORM.call_once(|| platform);
    kirq::global::init(platform, config)
}

/// Trap-path entry: runs the handlers for IDT `vector` and acknowledges it.
/// Vectors outside the controller's range are ignored.
pub fn dispatch_vector(vector: u8) {
    let Some(platform) = PLATFORM.get() else {
        return;
    };
    let Some(line) = platform.line_for_vector(vector) else {
        return;
    };
    kirq::global::dispatch(line);
    platform.end_of_interrupt(line);
}
