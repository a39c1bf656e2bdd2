//! Interrupt handler registry and dispatcher.
//!
//! Drivers attach handlers to interrupt lines with [`Registry::register`],
//! detach them with [`Registry::unregister`], and the trap path calls
//! [`Registry::dispatch`] with the fired vector. Every line may carry any
//! number of handlers; they run in registration order.
//!
//! **Locking discipline:**
//! - A blocking structural mutex serialises writers while they decide what
//!   to allocate or free. It is never taken from interrupt context.
//! - The link/unlink step itself runs with interrupt delivery masked, so
//!   dispatch never observes a half-linked chain.
//! - Dispatch only reads the table and never takes the structural mutex.
//!
//! The architecture layer (masking, per-line enable) is supplied by the
//! caller through the [`Platform`] trait.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod arena;
mod config;
mod error;
pub mod global;
mod handler;
mod mask;
mod platform;
mod registry;
mod table;

pub use arena::ArenaStats;
pub use config::{MaskMode, RegistryConfig};
pub use error::IrqError;
pub use handler::{DeviceId, DriverId, Filter, Handler, IrqHandler, IsrFn};
pub use mask::{IrqFlags, MaskGuard};
pub use platform::Platform;
pub use registry::{Registry, Stats};
