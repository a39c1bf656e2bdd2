//! I/O APIC as an interrupt line controller.
//!
//! Each input pin has a 64-bit redirection entry naming the IDT vector,
//! trigger mode, polarity and destination. Pin `n` is delivered on
//! `vector_base + n` to the bootstrap processor. Registers are reached
//! through the IOREGSEL/IOWIN window pair, which must be used atomically,
//! so every access goes through one lock.

use core::ptr;

use bitflags::bitflags;
use spin::Mutex;

/// Standard I/O APIC physical base address.
pub const IOAPIC_PHYS_BASE: u64 = 0xFEC0_0000;

/// Data window (IOWIN) offset from base.
const IOWIN_OFFSET: usize = 0x10;

const IOAPICVER: u32 = 0x01;
/// Redirection table base index; each entry uses two consecutive indices.
const IOREDTBL_BASE: u32 = 0x10;

bitflags! {
    /// Control bits in the low word of a redirection entry.
    ///
    /// Delivery mode (bits 8-10) is always Fixed and is not represented.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RedirectionFlags: u32 {
        /// Destination field is a logical APIC set instead of an APIC ID.
        const LOGICAL = 1 << 11;
        /// Pin is asserted low.
        const ACTIVE_LOW = 1 << 13;
        /// Level triggered instead of edge triggered.
        const LEVEL = 1 << 15;
        /// Interrupt is not delivered.
        const MASKED = 1 << 16;
    }
}

/// Decoded redirection table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectionEntry {
    pub vector: u8,
    pub flags: RedirectionFlags,
    pub destination: u8,
}

impl RedirectionEntry {
    /// Edge triggered, active high, physical destination APIC 0: the
    /// defaults for ISA interrupts.
    pub const fn isa(vector: u8) -> Self {
        Self {
            vector,
            flags: RedirectionFlags::empty(),
            destination: 0,
        }
    }

    pub fn masked(mut self, masked: bool) -> Self {
        self.flags.set(RedirectionFlags::MASKED, masked);
        self
    }

    /// `(low, high)` register words.
    pub fn encode(self) -> (u32, u32) {
        (
            self.vector as u32 | self.flags.bits(),
            (self.destination as u32) << 24,
        )
    }

    pub fn decode(low: u32, high: u32) -> Self {
        Self {
            vector: (low & 0xFF) as u8,
            flags: RedirectionFlags::from_bits_truncate(low),
            destination: (high >> 24) as u8,
        }
    }
}

/// IDT vector for `pin`, or `None` when it would run past vector 255.
pub(crate) fn pin_vector(vector_base: u8, pin: u32) -> Option<u8> {
    vector_base.checked_add(u8::try_from(pin).ok()?)
}

/// Number of redirection entries advertised by the version register.
pub(crate) fn entries_from_version(version: u32) -> u32 {
    ((version >> 16) & 0xFF) + 1
}

pub struct IoApic {
    base: usize,
    vector_base: u8,
    window: Mutex<()>,
}

impl IoApic {
    /// # Safety
    ///
    /// `base` must be the virtual address of a mapped I/O APIC register
    /// block that nothing else accesses.
    pub const unsafe fn new(base: usize, vector_base: u8) -> Self {
        Self {
            base,
            vector_base,
            window: Mutex::new(()),
        }
    }

    pub fn vector_base(&self) -> u8 {
        self.vector_base
    }

    fn read(&self, index: u32) -> u32 {
        let _window = self.window.lock();
        // SAFETY: `base` maps an I/O APIC (see `new`).
        unsafe {
            ptr::write_volatile(self.base as *mut u32, index);
            ptr::read_volatile((self.base + IOWIN_OFFSET) as *const u32)
        }
    }

    fn write(&self, index: u32, value: u32) {
        let _window = self.window.lock();
        unsafe {
            ptr::write_volatile(self.base as *mut u32, index);
            ptr::write_volatile((self.base + IOWIN_OFFSET) as *mut u32, value);
        }
    }

    pub fn entries(&self) -> u32 {
        entries_from_version(self.read(IOAPICVER))
    }

    /// Masks every pin. Call once before the first line is enabled.
    pub fn init(&self) {
        let entries = self.entries();
        for pin in 0..entries {
            let entry = self.read_entry(pin).masked(true);
            self.write_entry(pin, entry);
        }
        log::debug!("ioapic: {} pins masked, vector base {}", entries, self.vector_base);
    }

    pub fn read_entry(&self, pin: u32) -> RedirectionEntry {
        let index = IOREDTBL_BASE + pin * 2;
        RedirectionEntry::decode(self.read(index), self.read(index + 1))
    }

    pub fn write_entry(&self, pin: u32, entry: RedirectionEntry) {
        let index = IOREDTBL_BASE + pin * 2;
        let (low, high) = entry.encode();
        self.write(index + 1, high);
        self.write(index, low);
    }

    /// Routes `pin` to its vector and unmasks it. Returns `false` for pins
    /// past the end of the redirection table or without a vector above
    /// `vector_base`.
    pub fn unmask(&self, pin: u32) -> bool {
        if pin >= self.entries() {
            return false;
        }
        let Some(vector) = pin_vector(self.vector_base, pin) else {
            return false;
        };
        self.write_entry(pin, RedirectionEntry::isa(vector));
        true
    }

    /// Masks `pin`, keeping the rest of its entry.
    pub fn mask(&self, pin: u32) -> bool {
        if pin >= self.entries() {
            return false;
        }
        let entry = self.read_entry(pin).masked(true);
        self.write_entry(pin, entry);
        true
    }
}
