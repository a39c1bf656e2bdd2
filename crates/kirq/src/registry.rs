//! The interrupt handler registry.
//!
//! Writers (`register`, `unregister`) take the structural mutex for the whole
//! operation and inspect the table through the shared read side, the same
//! side `dispatch` uses, while they decide what to allocate or remove. Each
//! structural change then happens with the writer's core masked and the
//! table locked for exclusive access; the exclusive lock is released before
//! interrupts are restored. Because the mutex keeps other writers out,
//! handles found while reading stay valid across that switch.
//!
//! Dispatch never waits on the mutex. On the writer's own core it cannot run
//! during the exclusive step (interrupts are masked); on other cores it waits
//! at most for one link or unlink.

use spin::{Mutex, RwLock};

use crate::arena::ArenaStats;
use crate::config::RegistryConfig;
use crate::error::IrqError;
use crate::handler::{DeviceId, DriverId, Filter, Handler};
use crate::mask::{IrqFlags, LocalMask, MaskGuard, MaskState};
use crate::platform::Platform;
use crate::table::{HandlerEntry, LineTable};

/// Snapshot of the registry's storage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub lines: ArenaStats,
    pub handlers: ArenaStats,
}

/// Multiplexing interrupt handler registry.
///
/// Constructing a `Registry` is the `init` step and [`Registry::deinit`] the
/// teardown. Instances are independent; a process-wide one is available
/// through [`crate::global`].
pub struct Registry<P: Platform> {
    platform: P,
    /// Serialises writers. Never taken from interrupt context.
    gate: Mutex<()>,
    lines: RwLock<LineTable>,
    mask: MaskState,
}

impl<P: Platform> Registry<P> {
    /// Creates an empty registry with interrupts marked enabled.
    pub fn new(platform: P, config: RegistryConfig) -> Self {
        log::debug!(
            "irq registry: init (max lines {}, max handlers {}, {:?} masking)",
            config.max_lines,
            config.max_handlers,
            config.mask_mode
        );
        Self {
            platform,
            gate: Mutex::new(()),
            lines: RwLock::new(LineTable::new(config.max_lines, config.max_handlers)),
            mask: MaskState::new(config.mask_mode),
        }
    }

    /// Tears the registry down, returning how many handlers were still
    /// registered. Those handlers are dropped with the registry.
    pub fn deinit(self) -> usize {
        let remaining = self.lines.read().entry_count();
        if remaining > 0 {
            log::warn!("irq registry: deinit with {remaining} handlers still registered");
        } else {
            log::debug!("irq registry: deinit");
        }
        remaining
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    // ── Registration ────────────────────────────────────────────

    /// Attaches `handler` to interrupt line `irq` on behalf of `driver`.
    ///
    /// Fails with [`IrqError::InvalidIrq`] for a negative `irq`,
    /// [`IrqError::AlreadyRegistered`] when the line already carries an
    /// overlapping (driver, device) registration, and
    /// [`IrqError::OutOfMemory`] when storage runs out. Nothing is retained
    /// on failure.
    ///
    /// Must not be called from interrupt context.
    pub fn register(
        &self,
        irq: i32,
        handler: Handler,
        device: Option<DeviceId>,
        driver: DriverId,
    ) -> Result<(), IrqError> {
        let irq = line_number(irq)?;

        let _gate = self.gate.lock();

        let line = {
            let table = self.lines.read();
            let line = table.find(irq);
            if let Some(line) = line {
                if table.conflicts(line, driver, device) {
                    log::error!(
                        "irq {irq}: driver {driver} already registered, will not register again"
                    );
                    return Err(IrqError::AlreadyRegistered { irq });
                }
            }
            line
        };

        let _masked = self.link_section();
        let mut table = self.lines.write();

        let entry = match table.alloc_entry(HandlerEntry::new(handler, driver, device)) {
            Ok(entry) => entry,
            Err(_) => {
                log::error!("irq {irq}: cannot allocate handler entry for driver {driver}");
                return Err(IrqError::OutOfMemory { irq });
            }
        };

        match line {
            Some(line) => {
                table.append_entry(line, entry);
                log::debug!("irq {irq}: added driver {driver}");
            }
            None => {
                let line = match table.alloc_line(irq, entry) {
                    Ok(line) => line,
                    Err(_) => {
                        table.free_entry(entry);
                        log::error!("irq {irq}: cannot allocate line descriptor");
                        return Err(IrqError::OutOfMemory { irq });
                    }
                };
                table.append_line(line);
                log::debug!("irq {irq}: added line for driver {driver}");
            }
        }

        Ok(())
    }

    /// Detaches every registration on `irq` matched by `filter`.
    ///
    /// Returns the number of handlers removed. Fails with
    /// [`IrqError::NotFound`] when the line has no registrations or none
    /// match. The line itself disappears once its last handler is removed.
    ///
    /// Must not be called from interrupt context.
    pub fn unregister(&self, irq: i32, filter: &Filter) -> Result<usize, IrqError> {
        let irq = line_number(irq)?;

        let _gate = self.gate.lock();

        let Some(line) = self.lines.read().find(irq) else {
            log::debug!("irq {irq}: no matching line");
            return Err(IrqError::NotFound { irq });
        };
        log::debug!("irq {irq}: found line");

        let mut removed = 0;
        let mut after = None;
        loop {
            let (prev, current) = {
                let table = self.lines.read();
                let Some((prev, current)) = table.next_match(line, after, filter) else {
                    break;
                };
                if let Some(entry) = table.entry(current) {
                    log::debug!(
                        "irq {irq}: unregister {:?} driver {} device {:?}",
                        entry.handler,
                        entry.driver,
                        entry.device
                    );
                }
                (prev, current)
            };

            let masked = self.link_section();
            let freed = self.lines.write().unlink_entry(line, prev, current);
            drop(masked);
            drop(freed);

            removed += 1;
            // The successor of `prev` is now whatever followed `current`.
            after = prev;
        }

        if removed == 0 {
            log::debug!("irq {irq}: no matching entry");
            return Err(IrqError::NotFound { irq });
        }

        if self.lines.read().handler_count(line) == 0 {
            log::debug!("irq {irq}: handler list empty, removing line");
            let masked = self.link_section();
            self.lines.write().unlink_line(line);
            drop(masked);
        }

        Ok(removed)
    }

    // ── Interrupt context ───────────────────────────────────────

    /// Runs every handler registered on `vector`, in registration order.
    ///
    /// Entry point for the trap path; never blocks on the structural mutex.
    /// An unregistered vector is ignored.
    pub fn dispatch(&self, vector: u32) {
        let table = self.lines.read();
        let Some(line) = table.find(vector) else {
            #[cfg(feature = "trace-dispatch")]
            log::trace!("irq {vector}: no handlers");
            return;
        };

        #[cfg(feature = "trace-dispatch")]
        log::trace!("irq {vector}: dispatching {} handlers", table.handler_count(line));

        for (_, entry) in table.chain(line) {
            entry.handler.call(vector, entry.driver);
        }
    }

    // ── Masking and line control ────────────────────────────────

    /// Masks this core for one exclusive table step, whatever the shared
    /// save/restore state says.
    fn link_section(&self) -> LocalMask<'_, P> {
        LocalMask::new(&self.platform)
    }

    /// Masks interrupt delivery if it is currently enabled.
    pub fn save_and_disable(&self) -> IrqFlags {
        self.mask.save_and_disable(&self.platform)
    }

    /// Ends a section opened by [`Registry::save_and_disable`].
    pub fn restore(&self, flags: IrqFlags) {
        self.mask.restore(&self.platform, flags)
    }

    /// Masks interrupt delivery until the returned guard is dropped.
    pub fn masked(&self) -> MaskGuard<'_, P> {
        MaskGuard::new(&self.mask, &self.platform)
    }

    /// Whether the mask state currently reports delivery as enabled.
    pub fn interrupts_enabled(&self) -> bool {
        self.mask.is_enabled()
    }

    /// Unmasks one line at the controller, whether or not it has handlers.
    pub fn enable(&self, vector: u32) {
        self.platform.enable_line(vector);
    }

    /// Masks one line at the controller, whether or not it has handlers.
    pub fn disable(&self, vector: u32) {
        self.platform.disable_line(vector);
    }

    // ── Introspection ───────────────────────────────────────────

    pub fn is_registered(&self, irq: u32) -> bool {
        self.lines.read().find(irq).is_some()
    }

    pub fn handler_count(&self, irq: u32) -> usize {
        let table = self.lines.read();
        table.find(irq).map_or(0, |line| table.handler_count(line))
    }

    pub fn line_count(&self) -> usize {
        self.lines.read().line_count()
    }

    pub fn stats(&self) -> Stats {
        let table = self.lines.read();
        Stats {
            lines: table.line_stats(),
            handlers: table.entry_stats(),
        }
    }
}

fn line_number(irq: i32) -> Result<u32, IrqError> {
    u32::try_from(irq).map_err(|_| {
        log::error!("irq {irq} needs to be a non-negative number");
        IrqError::InvalidIrq(irq)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Quiet {
        masks: AtomicUsize,
    }

    impl Platform for Quiet {
        fn mask_all(&self) {
            self.masks.fetch_add(1, Ordering::SeqCst);
        }
        fn unmask_all(&self) {}
        fn local_enabled(&self) -> bool {
            true
        }
        fn enable_line(&self, _: u32) {}
        fn disable_line(&self, _: u32) {}
    }

    fn driver(raw: usize) -> DriverId {
        DriverId::new(raw).unwrap()
    }

    fn noop() -> Handler {
        Handler::new(|_: u32, _: DriverId| {})
    }

    #[test]
    fn register_masks_around_link() {
        let registry = Registry::new(Quiet::default(), RegistryConfig::new());
        registry.register(4, noop(), None, driver(1)).unwrap();

        assert_eq!(registry.platform().masks.load(Ordering::SeqCst), 1);
        assert!(registry.interrupts_enabled());
    }

    #[test]
    fn rejected_duplicate_does_not_mask() {
        let registry = Registry::new(Quiet::default(), RegistryConfig::new());
        registry.register(4, noop(), None, driver(1)).unwrap();
        let err = registry.register(4, noop(), None, driver(1)).unwrap_err();

        assert_eq!(err, IrqError::AlreadyRegistered { irq: 4 });
        assert_eq!(registry.platform().masks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_masks_per_removed_node_and_line() {
        let registry = Registry::new(Quiet::default(), RegistryConfig::new());
        for raw in 1..=3 {
            registry.register(2, noop(), None, driver(raw)).unwrap();
        }
        let before = registry.platform().masks.load(Ordering::SeqCst);

        assert_eq!(registry.unregister(2, &Filter::any()), Ok(3));
        // Three unlinks plus the line itself.
        assert_eq!(registry.platform().masks.load(Ordering::SeqCst) - before, 4);
    }

    #[test]
    fn line_oom_releases_entry() {
        let config = RegistryConfig::new().with_max_lines(1);
        let registry = Registry::new(Quiet::default(), config);
        registry.register(1, noop(), None, driver(1)).unwrap();

        let err = registry.register(2, noop(), None, driver(1)).unwrap_err();
        assert_eq!(err, IrqError::OutOfMemory { irq: 2 });

        let stats = registry.stats();
        assert_eq!(stats.handlers.live, 1);
        assert_eq!(stats.handlers.frees, 1);
        assert_eq!(stats.lines.failed_allocations, 1);
        assert!(!registry.is_registered(2));
        assert!(registry.interrupts_enabled());
    }

    #[test]
    fn deinit_reports_leftovers() {
        let registry = Registry::new(Quiet::default(), RegistryConfig::new());
        registry.register(7, noop(), None, driver(1)).unwrap();
        registry.register(8, noop(), None, driver(1)).unwrap();
        assert_eq!(registry.deinit(), 2);
    }

    #[test]
    fn dispatch_passes_vector_and_driver() {
        let seen = alloc::sync::Arc::new(spin::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let registry = Registry::new(Quiet::default(), RegistryConfig::new());
        registry
            .register(
                12,
                Handler::new(move |vector: u32, d: DriverId| sink.lock().push((vector, d.get()))),
                None,
                driver(0x40),
            )
            .unwrap();

        registry.dispatch(12);
        registry.dispatch(13);
        assert_eq!(*seen.lock(), [(12, 0x40)]);
    }
}
