//! Randomised register/unregister sequences checked against a plain model.

mod common;

use common::{MockPlatform, Recorder, device, driver};
use kirq::{Filter, IrqError, Registry, RegistryConfig};
use proptest::prelude::*;

/// One registration as the model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    irq: u32,
    driver: usize,
    device: Option<usize>,
    name: &'static str,
}

#[derive(Debug, Clone)]
enum Op {
    Register {
        irq: u32,
        driver: usize,
        device: Option<usize>,
    },
    Unregister {
        irq: u32,
        driver: Option<usize>,
        device: Option<usize>,
    },
}

const NAMES: [&str; 4] = ["h0", "h1", "h2", "h3"];

fn op() -> impl Strategy<Value = Op> {
    let irq = 0u32..4;
    let driver = 1usize..4;
    let device = proptest::option::of(1usize..3);
    prop_oneof![
        (irq.clone(), driver.clone(), device.clone())
            .prop_map(|(irq, driver, device)| Op::Register { irq, driver, device }),
        (irq, proptest::option::of(driver), device)
            .prop_map(|(irq, driver, device)| Op::Unregister { irq, driver, device }),
    ]
}

fn name_for(driver: usize) -> &'static str {
    NAMES[driver % NAMES.len()]
}

fn conflicts(existing: &Entry, irq: u32, driver: usize, device: Option<usize>) -> bool {
    existing.irq == irq
        && existing.driver == driver
        && (device.is_none() || existing.device.is_none() || existing.device == device)
}

proptest! {
    #[test]
    fn registry_matches_model(ops in proptest::collection::vec(op(), 1..40)) {
        let reg = Registry::new(MockPlatform::new(), RegistryConfig::new());
        let rec = Recorder::new();
        let mut model: Vec<Entry> = Vec::new();

        for op in ops {
            match op {
                Op::Register { irq, driver: d, device: dev } => {
                    let result = reg.register(
                        irq as i32,
                        rec.handler(name_for(d)),
                        dev.map(device),
                        driver(d),
                    );
                    if model.iter().any(|e| conflicts(e, irq, d, dev)) {
                        prop_assert_eq!(result, Err(IrqError::AlreadyRegistered { irq }));
                    } else {
                        prop_assert_eq!(result, Ok(()));
                        model.push(Entry { irq, driver: d, device: dev, name: name_for(d) });
                    }
                }
                Op::Unregister { irq, driver: d, device: dev } => {
                    let filter = Filter::from_parts(None, dev.map(device), d.map(driver));
                    let result = reg.unregister(irq as i32, &filter);
                    let before = model.len();
                    model.retain(|e| {
                        !(e.irq == irq
                            && d.is_none_or(|d| d == e.driver)
                            && dev.is_none_or(|dev| Some(dev) == e.device))
                    });
                    match before - model.len() {
                        0 => prop_assert_eq!(result, Err(IrqError::NotFound { irq })),
                        n => prop_assert_eq!(result, Ok(n)),
                    }
                }
            }

            for irq in 0u32..4 {
                let expected: Vec<&str> = model
                    .iter()
                    .filter(|e| e.irq == irq)
                    .map(|e| e.name)
                    .collect();
                prop_assert_eq!(reg.is_registered(irq), !expected.is_empty());
                prop_assert_eq!(reg.handler_count(irq), expected.len());
                reg.dispatch(irq);
                prop_assert_eq!(rec.take(), expected);
            }
        }

        prop_assert_eq!(reg.stats().handlers.live, model.len());
        prop_assert!(reg.interrupts_enabled());
    }
}
