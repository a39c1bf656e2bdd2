//! [`kirq::Platform`] for x86_64.
//!
//! Global masking is the CPU interrupt flag (`cli`/`sti`). Per-line control
//! goes to whichever controller routes external interrupts: the legacy PIC
//! pair or an I/O APIC. Registry line numbers are controller inputs, not
//! IDT vectors; [`X86Platform::line_for_vector`] converts on the trap path.

use x86_64::instructions::interrupts;

use crate::ioapic::IoApic;
use crate::pic::{self, LegacyPic};

pub enum Controller {
    Pic(LegacyPic),
    IoApic(IoApic),
}

impl Controller {
    fn vector_base(&self) -> u8 {
        match self {
            Controller::Pic(pic) => pic.vector_base(),
            Controller::IoApic(ioapic) => ioapic.vector_base(),
        }
    }
}

pub struct X86Platform {
    controller: Controller,
}

impl X86Platform {
    pub const fn new(controller: Controller) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Controller line that raised IDT `vector`, if the vector belongs to it.
    pub fn line_for_vector(&self, vector: u8) -> Option<u32> {
        let line = vector.checked_sub(self.controller.vector_base())?;
        match self.controller {
            Controller::Pic(_) if line >= pic::LINES => None,
            _ => Some(line as u32),
        }
    }

    /// Acknowledges `line` at the controller. The I/O APIC is acknowledged
    /// through the local APIC, which is outside this crate.
    pub fn end_of_interrupt(&self, line: u32) {
        if let Controller::Pic(pic) = &self.controller {
            if let Ok(line) = u8::try_from(line) {
                pic.end_of_interrupt(line);
            }
        }
    }

    fn set_line(&self, line: u32, enabled: bool) {
        let known = match &self.controller {
            Controller::Pic(pic) => match u8::try_from(line) {
                Ok(line) if enabled => pic.unmask(line),
                Ok(line) => pic.mask(line),
                Err(_) => false,
            },
            Controller::IoApic(ioapic) if enabled => ioapic.unmask(line),
            Controller::IoApic(ioapic) => ioapic.mask(line),
        };
        if !known {
            log::warn!("irq {}: no such controller line", line);
        }
    }
}

impl kirq::Platform for X86Platform {
    fn mask_all(&self) {
        interrupts::disable();
    }

    fn unmask_all(&self) {
        interrupts::enable();
    }

    fn local_enabled(&self) -> bool {
        interrupts::are_enabled()
    }

    fn enable_line(&self, vector: u32) {
        self.set_line(vector, true);
    }

    fn disable_line(&self, vector: u32) {
        self.set_line(vector, false);
    }
}
