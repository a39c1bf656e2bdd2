//! Legacy 8259 PIC pair, used as an interrupt line controller.
//!
//! Lines 0-7 live on the master, 8-15 on the slave, which cascades into
//! master line 2. After [`LegacyPic::init`] every line is masked; the
//! registry unmasks individual lines through OCW1 writes to the data ports.

use spin::Mutex;
use x86_64::instructions::port::Port;

/// I/O port addresses for the master PIC.
const PIC1_COMMAND: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;

/// I/O port addresses for the slave PIC.
const PIC2_COMMAND: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

/// ICW1: begin initialization, ICW4 will be sent.
const ICW1_INIT_ICW4: u8 = 0x11;
/// ICW4: 8086/88 mode.
const ICW4_8086: u8 = 0x01;
/// OCW2: non-specific end of interrupt.
const OCW2_EOI: u8 = 0x20;

/// Master input the slave is wired to.
const CASCADE_LINE: u8 = 2;

pub const LINES: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Chip {
    Master,
    Slave,
}

/// Which chip and which bit of its mask register serve `line`.
pub(crate) fn locate(line: u8) -> Option<(Chip, u8)> {
    match line {
        0..=7 => Some((Chip::Master, line)),
        8..=15 => Some((Chip::Slave, line - 8)),
        _ => None,
    }
}

/// Mask register value with `bit` set (masked) or cleared.
pub(crate) fn with_bit(mask: u8, bit: u8, masked: bool) -> u8 {
    if masked {
        mask | (1 << bit)
    } else {
        mask & !(1 << bit)
    }
}

struct PicPorts {
    master_command: Port<u8>,
    master_data: Port<u8>,
    slave_command: Port<u8>,
    slave_data: Port<u8>,
}

impl PicPorts {
    fn data(&mut self, chip: Chip) -> &mut Port<u8> {
        match chip {
            Chip::Master => &mut self.master_data,
            Chip::Slave => &mut self.slave_data,
        }
    }
}

pub struct LegacyPic {
    ports: Mutex<PicPorts>,
    vector_base: u8,
}

impl LegacyPic {
    /// `vector_base` is the IDT vector of line 0; the slave follows at +8.
    pub const fn new(vector_base: u8) -> Self {
        Self {
            ports: Mutex::new(PicPorts {
                master_command: Port::new(PIC1_COMMAND),
                master_data: Port::new(PIC1_DATA),
                slave_command: Port::new(PIC2_COMMAND),
                slave_data: Port::new(PIC2_DATA),
            }),
            vector_base,
        }
    }

    pub fn vector_base(&self) -> u8 {
        self.vector_base
    }

    /// Remaps both chips to `vector_base` and masks every line.
    ///
    /// # Safety
    ///
    /// Must run on x86 hardware with a legacy PIC pair, before any line is
    /// unmasked and with interrupts disabled.
    pub unsafe fn init(&self) {
        let mut ports = self.ports.lock();
        unsafe {
            ports.master_command.write(ICW1_INIT_ICW4);
            ports.slave_command.write(ICW1_INIT_ICW4);

            ports.master_data.write(self.vector_base);
            ports.slave_data.write(self.vector_base.wrapping_add(8));

            ports.master_data.write(1 << CASCADE_LINE);
            ports.slave_data.write(CASCADE_LINE);

            ports.master_data.write(ICW4_8086);
            ports.slave_data.write(ICW4_8086);

            ports.master_data.write(0xFF);
            ports.slave_data.write(0xFF);
        }
        log::debug!("pic: remapped to vector {}", self.vector_base);
    }

    /// Unmasks `line`. Returns `false` for lines the pair does not have.
    pub fn unmask(&self, line: u8) -> bool {
        let Some((chip, bit)) = locate(line) else {
            return false;
        };
        let mut ports = self.ports.lock();
        // SAFETY: OCW1 writes only change the interrupt mask register.
        unsafe {
            let port = ports.data(chip);
            let mask = port.read();
            port.write(with_bit(mask, bit, false));
            if chip == Chip::Slave {
                let port = ports.data(Chip::Master);
                let mask = port.read();
                port.write(with_bit(mask, CASCADE_LINE, false));
            }
        }
        true
    }

    /// Masks `line`. The cascade stays open so the other slave lines keep
    /// working.
    pub fn mask(&self, line: u8) -> bool {
        let Some((chip, bit)) = locate(line) else {
            return false;
        };
        let mut ports = self.ports.lock();
        // SAFETY: see `unmask`.
        unsafe {
            let port = ports.data(chip);
            let mask = port.read();
            port.write(with_bit(mask, bit, true));
        }
        true
    }

    /// Acknowledges `line` so the chip can raise it again.
    pub fn end_of_interrupt(&self, line: u8) {
        let Some((chip, _)) = locate(line) else {
            return;
        };
        let mut ports = self.ports.lock();
        unsafe {
            if chip == Chip::Slave {
                ports.slave_command.write(OCW2_EOI);
            }
            ports.master_command.write(OCW2_EOI);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Some((Chip::Master, 0)))]
    #[case(7, Some((Chip::Master, 7)))]
    #[case(8, Some((Chip::Slave, 0)))]
    #[case(15, Some((Chip::Slave, 7)))]
    #[case(16, None)]
    fn lines_map_to_chip_bits(#[case] line: u8, #[case] expected: Option<(Chip, u8)>) {
        assert_eq!(locate(line), expected);
    }

    #[test]
    fn mask_bits() {
        assert_eq!(with_bit(0xFF, 1, false), 0xFD);
        assert_eq!(with_bit(0xFD, 1, true), 0xFF);
        assert_eq!(with_bit(0x00, 7, true), 0x80);
        // Already in the requested state.
        assert_eq!(with_bit(0x04, 2, true), 0x04);
    }
}
