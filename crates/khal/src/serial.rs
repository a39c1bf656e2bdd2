//! COM1 UART (16550) as a polled log sink.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;
use x86_64::instructions::port::Port;

/// COM1 base port address
const COM1_PORT: u16 = 0x3F8;

/// Line status register bit: transmit holding register empty.
const LSR_THR_EMPTY: u8 = 0x20;

struct Uart {
    base: u16,
}

impl Uart {
    fn port(&self, offset: u16) -> Port<u8> {
        Port::new(self.base + offset)
    }

    /// 115200 baud, 8N1, FIFOs on, UART interrupts off. Returns whether the
    /// loopback self-test passed.
    unsafe fn configure(&self) -> bool {
        unsafe {
            self.port(1).write(0x00);
            // DLAB on, divisor 1.
            self.port(3).write(0x80);
            self.port(0).write(0x01);
            self.port(1).write(0x00);
            // 8N1, DLAB off.
            self.port(3).write(0x03);
            self.port(2).write(0xC7);

            // Loopback self-test.
            self.port(4).write(0x1E);
            self.port(0).write(0xAE);
            let ok = self.port(0).read() == 0xAE;

            // Normal operation, still polled.
            self.port(4).write(0x0F);
            self.port(1).write(0x00);
            ok
        }
    }

    fn write_byte(&self, byte: u8) {
        unsafe {
            while self.port(5).read() & LSR_THR_EMPTY == 0 {
                core::hint::spin_loop();
            }
            self.port(0).write(byte);
        }
    }
}

/// Serial console usable as a [`klog::Sink`].
///
/// Writes before [`SerialSink::init`] are dropped.
pub struct SerialSink {
    uart: Mutex<Uart>,
    ready: AtomicBool,
}

impl SerialSink {
    pub const fn com1() -> Self {
        Self {
            uart: Mutex::new(Uart { base: COM1_PORT }),
            ready: AtomicBool::new(false),
        }
    }

    /// Programs the UART. Returns `false` if the loopback test failed; the
    /// port is still used in that case.
    ///
    /// # Safety
    ///
    /// Nothing else may drive the UART's I/O ports.
    pub unsafe fn init(&self) -> bool {
        let ok = unsafe { self.uart.lock().configure() };
        self.ready.store(true, Ordering::Release);
        ok
    }
}

impl klog::Sink for SerialSink {
    fn write_str(&self, s: &str) -> fmt::Result {
        if !self.ready.load(Ordering::Acquire) {
            return Err(fmt::Error);
        }
        let uart = self.uart.lock();
        for byte in s.bytes() {
            if byte == b'\n' {
                uart.write_byte(b'\r');
            }
            uart.write_byte(byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use klog::Sink;

    #[test]
    fn writes_before_init_are_refused() {
        let sink = SerialSink::com1();
        assert_eq!(sink.write_str("early\n"), Err(fmt::Error));
    }
}
