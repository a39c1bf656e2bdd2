//! Shared fixtures: a recording platform and recording handlers.
#![allow(dead_code)]

use std::cell::Cell;
use std::sync::Arc;

use kirq::{DeviceId, DriverId, Handler, Platform};
use spin::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    MaskAll,
    UnmaskAll,
    Enable(u32),
    Disable(u32),
}

thread_local! {
    // Each test thread plays one core with its own interrupt flag.
    static CORE_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Platform that records every architecture call instead of touching hardware.
pub struct MockPlatform {
    events: Mutex<Vec<Event>>,
}

impl MockPlatform {
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn count(&self, event: Event) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }
}

impl Platform for MockPlatform {
    fn mask_all(&self) {
        CORE_ENABLED.with(|core| core.set(false));
        self.events.lock().push(Event::MaskAll);
    }

    fn unmask_all(&self) {
        CORE_ENABLED.with(|core| core.set(true));
        self.events.lock().push(Event::UnmaskAll);
    }

    fn local_enabled(&self) -> bool {
        CORE_ENABLED.with(Cell::get)
    }

    fn enable_line(&self, vector: u32) {
        self.events.lock().push(Event::Enable(vector));
    }

    fn disable_line(&self, vector: u32) {
        self.events.lock().push(Event::Disable(vector));
    }
}

/// One handler invocation as seen by a [`Recorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub name: &'static str,
    pub vector: u32,
    pub driver: usize,
}

/// Hands out named handlers that log their invocations in order.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self, name: &'static str) -> Handler {
        let calls = self.calls.clone();
        Handler::new(move |vector: u32, driver: DriverId| {
            calls.lock().push(Call {
                name,
                vector,
                driver: driver.get(),
            });
        })
    }

    /// Names of the handlers called since the last `take`.
    pub fn take(&self) -> Vec<&'static str> {
        self.calls.lock().drain(..).map(|c| c.name).collect()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        self.calls.lock().drain(..).collect()
    }
}

pub fn driver(raw: usize) -> DriverId {
    DriverId::new(raw).expect("non-zero driver id")
}

pub fn device(raw: usize) -> DeviceId {
    DeviceId::new(raw).expect("non-zero device id")
}
