//! Line table and per-line handler chains.
//!
//! Both are singly linked through [`Handle`]s into two arenas: one holding
//! [`LineDescriptor`]s, one holding [`HandlerEntry`]s. A node allocated in an
//! arena is invisible to readers until it is linked, so allocation and
//! linking are separate steps; only linking needs interrupts masked.
//!
//! **Invariants:**
//! - A linked line always has at least one entry; callers unlink the line
//!   as soon as its chain empties.
//! - Interrupt numbers are unique among linked lines.
//! - Chain order is insertion order.

use crate::arena::{Arena, ArenaStats, Exhausted, Handle};
use crate::handler::{DeviceId, DriverId, Filter, Handler};

/// One registered callback.
pub(crate) struct HandlerEntry {
    pub(crate) handler: Handler,
    pub(crate) driver: DriverId,
    pub(crate) device: Option<DeviceId>,
    next: Option<Handle>,
}

impl HandlerEntry {
    pub(crate) fn new(handler: Handler, driver: DriverId, device: Option<DeviceId>) -> Self {
        Self {
            handler,
            driver,
            device,
            next: None,
        }
    }

    /// Whether a new registration for `driver`/`device` would duplicate this one.
    ///
    /// A missing device on either side overlaps every device of the driver.
    fn conflicts_with(&self, driver: DriverId, device: Option<DeviceId>) -> bool {
        self.driver == driver
            && (device.is_none() || self.device.is_none() || self.device == device)
    }
}

/// Registration state of one interrupt number.
pub(crate) struct LineDescriptor {
    pub(crate) irq: u32,
    first: Option<Handle>,
    last: Option<Handle>,
    len: usize,
    next: Option<Handle>,
}

pub(crate) struct LineTable {
    lines: Arena<LineDescriptor>,
    entries: Arena<HandlerEntry>,
    head: Option<Handle>,
    tail: Option<Handle>,
}

impl LineTable {
    pub(crate) const fn new(max_lines: usize, max_handlers: usize) -> Self {
        Self {
            lines: Arena::with_limit(max_lines),
            entries: Arena::with_limit(max_handlers),
            head: None,
            tail: None,
        }
    }

    // ── Readers ─────────────────────────────────────────────────

    /// Linear scan for the line carrying `irq`.
    pub(crate) fn find(&self, irq: u32) -> Option<Handle> {
        self.lines()
            .find(|(_, line)| line.irq == irq)
            .map(|(handle, _)| handle)
    }

    pub(crate) fn lines(&self) -> Lines<'_> {
        Lines {
            table: self,
            cursor: self.head,
        }
    }

    pub(crate) fn chain(&self, line: Handle) -> Chain<'_> {
        Chain {
            table: self,
            cursor: self.lines.get(line).and_then(|l| l.first),
        }
    }

    pub(crate) fn entry(&self, entry: Handle) -> Option<&HandlerEntry> {
        self.entries.get(entry)
    }

    pub(crate) fn first_entry(&self, line: Handle) -> Option<Handle> {
        self.lines.get(line)?.first
    }

    /// First entry of `line` after `after` (or from the head when `None`)
    /// that `filter` selects, together with its predecessor.
    pub(crate) fn next_match(
        &self,
        line: Handle,
        after: Option<Handle>,
        filter: &Filter,
    ) -> Option<(Option<Handle>, Handle)> {
        let mut prev = after;
        let mut cursor = match after {
            Some(after) => self.entries.get(after)?.next,
            None => self.first_entry(line),
        };
        while let Some(current) = cursor {
            let entry = self.entries.get(current)?;
            if filter.matches(&entry.handler, entry.device, entry.driver) {
                return Some((prev, current));
            }
            prev = Some(current);
            cursor = entry.next;
        }
        None
    }

    /// Whether `line` already has a registration overlapping `driver`/`device`.
    pub(crate) fn conflicts(
        &self,
        line: Handle,
        driver: DriverId,
        device: Option<DeviceId>,
    ) -> bool {
        self.chain(line)
            .any(|(_, entry)| entry.conflicts_with(driver, device))
    }

    pub(crate) fn handler_count(&self, line: Handle) -> usize {
        self.lines.get(line).map_or(0, |l| l.len)
    }

    pub(crate) fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn line_stats(&self) -> ArenaStats {
        self.lines.stats()
    }

    pub(crate) fn entry_stats(&self) -> ArenaStats {
        self.entries.stats()
    }

    // ── Allocation (node exists, not yet reachable) ─────────────

    pub(crate) fn alloc_entry(&mut self, entry: HandlerEntry) -> Result<Handle, Exhausted> {
        self.entries.insert(entry)
    }

    /// Releases an entry that was allocated but never linked.
    pub(crate) fn free_entry(&mut self, entry: Handle) -> Option<HandlerEntry> {
        self.entries.remove(entry)
    }

    /// Allocates a descriptor for `irq` whose chain already holds `first`.
    pub(crate) fn alloc_line(&mut self, irq: u32, first: Handle) -> Result<Handle, Exhausted> {
        self.lines.insert(LineDescriptor {
            irq,
            first: Some(first),
            last: Some(first),
            len: 1,
            next: None,
        })
    }

    // ── Linking (callers mask interrupts around these) ──────────

    /// Appends an allocated entry to the tail of `line`'s chain.
    pub(crate) fn append_entry(&mut self, line: Handle, entry: Handle) {
        let Some(last) = self.lines.get(line).map(|l| l.last) else {
            return;
        };
        match last.and_then(|last| self.entries.get_mut(last)) {
            Some(tail) => tail.next = Some(entry),
            None => {
                if let Some(l) = self.lines.get_mut(line) {
                    l.first = Some(entry);
                }
            }
        }
        if let Some(l) = self.lines.get_mut(line) {
            l.last = Some(entry);
            l.len += 1;
        }
    }

    /// Appends an allocated descriptor to the tail of the line table.
    pub(crate) fn append_line(&mut self, line: Handle) {
        match self.tail.and_then(|tail| self.lines.get_mut(tail)) {
            Some(tail) => tail.next = Some(line),
            None => self.head = Some(line),
        }
        self.tail = Some(line);
    }

    /// Unlinks `entry` from `line`'s chain and frees it.
    ///
    /// `prev` is the entry linked before `entry`, or `None` when `entry` is
    /// first. The freed entry is handed back so the caller can drop its
    /// handler outside the masked section.
    pub(crate) fn unlink_entry(
        &mut self,
        line: Handle,
        prev: Option<Handle>,
        entry: Handle,
    ) -> Option<HandlerEntry> {
        let next = self.entries.get(entry)?.next;
        match prev {
            Some(prev) => self.entries.get_mut(prev)?.next = next,
            None => self.lines.get_mut(line)?.first = next,
        }

        let descriptor = self.lines.get_mut(line)?;
        if descriptor.last == Some(entry) {
            descriptor.last = prev;
        }
        descriptor.len -= 1;
        self.entries.remove(entry)
    }

    /// Unlinks an empty `line` from the table and frees it.
    pub(crate) fn unlink_line(&mut self, line: Handle) -> Option<LineDescriptor> {
        debug_assert_eq!(self.handler_count(line), 0);

        let mut prev = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if current == line {
                break;
            }
            prev = Some(current);
            cursor = self.lines.get(current)?.next;
        }
        cursor?;

        let next = self.lines.get(line)?.next;
        match prev {
            Some(prev) => self.lines.get_mut(prev)?.next = next,
            None => self.head = next,
        }
        if self.tail == Some(line) {
            self.tail = prev;
        }
        self.lines.remove(line)
    }
}

/// Iterator over linked lines in table order.
pub(crate) struct Lines<'a> {
    table: &'a LineTable,
    cursor: Option<Handle>,
}

impl<'a> Iterator for Lines<'a> {
    type Item = (Handle, &'a LineDescriptor);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let line = self.table.lines.get(handle)?;
        self.cursor = line.next;
        Some((handle, line))
    }
}

/// Iterator over one line's entries in dispatch order.
pub(crate) struct Chain<'a> {
    table: &'a LineTable,
    cursor: Option<Handle>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = (Handle, &'a HandlerEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let entry = self.table.entries.get(handle)?;
        self.cursor = entry.next;
        Some((handle, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use pretty_assertions::assert_eq;

    fn driver(raw: usize) -> DriverId {
        DriverId::new(raw).unwrap()
    }

    fn entry(raw: usize) -> HandlerEntry {
        HandlerEntry::new(Handler::new(|_: u32, _: DriverId| {}), driver(raw), None)
    }

    /// Builds a line for `irq` holding one entry per driver in `drivers`.
    fn line_with(table: &mut LineTable, irq: u32, drivers: &[usize]) -> Handle {
        let first = table.alloc_entry(entry(drivers[0])).unwrap();
        let line = table.alloc_line(irq, first).unwrap();
        table.append_line(line);
        for &raw in &drivers[1..] {
            let e = table.alloc_entry(entry(raw)).unwrap();
            table.append_entry(line, e);
        }
        line
    }

    fn drivers_of(table: &LineTable, line: Handle) -> Vec<usize> {
        table.chain(line).map(|(_, e)| e.driver.get()).collect()
    }

    fn irqs(table: &LineTable) -> Vec<u32> {
        table.lines().map(|(_, l)| l.irq).collect()
    }

    #[test]
    fn chain_keeps_insertion_order() {
        let mut table = LineTable::new(usize::MAX, usize::MAX);
        let line = line_with(&mut table, 5, &[1, 2, 3]);

        assert_eq!(drivers_of(&table, line), [1, 2, 3]);
        assert_eq!(table.handler_count(line), 3);
        assert_eq!(table.find(5), Some(line));
        assert_eq!(table.find(6), None);
    }

    #[test]
    fn unlink_head_middle_and_tail() {
        let mut table = LineTable::new(usize::MAX, usize::MAX);
        let line = line_with(&mut table, 1, &[1, 2, 3, 4]);
        let handles: Vec<Handle> = table.chain(line).map(|(h, _)| h).collect();

        table.unlink_entry(line, Some(handles[0]), handles[1]).unwrap();
        assert_eq!(drivers_of(&table, line), [1, 3, 4]);

        table.unlink_entry(line, None, handles[0]).unwrap();
        assert_eq!(drivers_of(&table, line), [3, 4]);

        table.unlink_entry(line, Some(handles[2]), handles[3]).unwrap();
        assert_eq!(drivers_of(&table, line), [3]);

        // The tail moved back; appending must land after driver 3.
        let e = table.alloc_entry(entry(9)).unwrap();
        table.append_entry(line, e);
        assert_eq!(drivers_of(&table, line), [3, 9]);
        assert_eq!(table.entry_count(), 2);
    }

    #[test]
    fn emptied_chain_accepts_new_entries() {
        let mut table = LineTable::new(usize::MAX, usize::MAX);
        let line = line_with(&mut table, 1, &[1]);
        let only = table.first_entry(line).unwrap();
        table.unlink_entry(line, None, only).unwrap();
        assert_eq!(table.handler_count(line), 0);

        let e = table.alloc_entry(entry(2)).unwrap();
        table.append_entry(line, e);
        assert_eq!(drivers_of(&table, line), [2]);
    }

    #[test]
    fn unlink_lines_keeps_table_order() {
        let mut table = LineTable::new(usize::MAX, usize::MAX);
        let a = line_with(&mut table, 10, &[1]);
        let b = line_with(&mut table, 11, &[1]);
        let c = line_with(&mut table, 12, &[1]);
        assert_eq!(irqs(&table), [10, 11, 12]);

        for line in [b, c, a] {
            let e = table.first_entry(line).unwrap();
            table.unlink_entry(line, None, e).unwrap();
        }

        table.unlink_line(b).unwrap();
        assert_eq!(irqs(&table), [10, 12]);
        table.unlink_line(c).unwrap();
        assert_eq!(irqs(&table), [10]);

        let d = line_with(&mut table, 13, &[1]);
        assert_eq!(irqs(&table), [10, 13]);
        table.unlink_line(a).unwrap();
        assert_eq!(irqs(&table), [13]);
        assert_eq!(table.find(13), Some(d));
        assert_eq!(table.line_count(), 1);
    }

    #[test]
    fn conflicts_follow_device_overlap() {
        let mut table = LineTable::new(usize::MAX, usize::MAX);
        let dev_a = DeviceId::new(0xa0).unwrap();
        let dev_b = DeviceId::new(0xb0).unwrap();

        let first = table
            .alloc_entry(HandlerEntry::new(
                Handler::new(|_: u32, _: DriverId| {}),
                driver(1),
                Some(dev_a),
            ))
            .unwrap();
        let line = table.alloc_line(3, first).unwrap();
        table.append_line(line);

        assert!(table.conflicts(line, driver(1), Some(dev_a)));
        assert!(table.conflicts(line, driver(1), None));
        assert!(!table.conflicts(line, driver(1), Some(dev_b)));
        assert!(!table.conflicts(line, driver(2), Some(dev_a)));
    }

    #[test]
    fn stale_line_handle_is_not_unlinked() {
        let mut table = LineTable::new(usize::MAX, usize::MAX);
        let line = line_with(&mut table, 1, &[1]);
        let e = table.first_entry(line).unwrap();
        table.unlink_entry(line, None, e).unwrap();
        table.unlink_line(line).unwrap();

        assert!(table.unlink_line(line).is_none());
        assert_eq!(table.line_stats().frees, 1);
    }
}
