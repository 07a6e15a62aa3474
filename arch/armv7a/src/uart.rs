// =============================================================================
// C5BOOT - UART Console
// =============================================================================
// Driver for UART0 of the Cyclone V HPS, a Synopsys DesignWare APB UART that
// is register compatible with the 16550 (32-bit register stride).
//
// Output only: the console carries the log and the demo program's text.
//
// Reference: Cyclone V Hard Processor System Technical Reference Manual, UART
// =============================================================================

use core::fmt::{self, Write};
use spin::Mutex;

/// Base address of UART0 on the Cyclone V HPS
const UART0_BASE: usize = 0xFFC0_2000;

/// l4_sp_clk feeding the UART as left by the preloader
const UART_CLOCK_HZ: u32 = 100_000_000;
const BAUD_RATE: u32 = 115_200;

/// Register offsets from the UART base
mod regs {
    /// Transmit holding (write) / divisor latch low with DLAB set
    pub const THR: usize = 0x00;
    pub const DLL: usize = 0x00;
    /// Interrupt enable / divisor latch high with DLAB set
    pub const IER: usize = 0x04;
    pub const DLH: usize = 0x04;
    /// FIFO control (write only)
    pub const FCR: usize = 0x08;
    pub const LCR: usize = 0x0C;
    pub const LSR: usize = 0x14;
}

mod lcr {
    /// 8 data bits, no parity, 1 stop bit
    pub const WLEN_8N1: u32 = 0b11;
    /// Divisor latch access
    pub const DLAB: u32 = 1 << 7;
}

mod fcr {
    pub const FIFO_ENABLE: u32 = 1 << 0;
    pub const RX_RESET: u32 = 1 << 1;
    pub const TX_RESET: u32 = 1 << 2;
}

/// Transmit holding register empty
const LSR_THRE: u32 = 1 << 5;

/// 16550-compatible UART driver
pub struct Uart {
    base: usize,
}

impl Uart {
    /// # Safety
    /// `base` must point to a 16550-compatible register block (or a stand-in
    /// of the same size) for as long as the driver is used.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn read_reg(&self, offset: usize) -> u32 {
        // SAFETY: `new` requires base to cover the register block
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    fn write_reg(&self, offset: usize, value: u32) {
        // SAFETY: `new` requires base to cover the register block
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    /// Configure 8-N-1 at `baud` from a `clock_hz` reference, FIFOs on,
    /// interrupts off.
    pub fn init(&self, clock_hz: u32, baud: u32) {
        let divisor = clock_hz / (16 * baud);

        self.write_reg(regs::IER, 0);
        self.write_reg(regs::LCR, lcr::DLAB);
        self.write_reg(regs::DLL, divisor & 0xFF);
        self.write_reg(regs::DLH, (divisor >> 8) & 0xFF);
        self.write_reg(regs::LCR, lcr::WLEN_8N1);
        self.write_reg(regs::FCR, fcr::FIFO_ENABLE | fcr::RX_RESET | fcr::TX_RESET);
    }

    /// Transmit a single byte, waiting for room in the holding register.
    pub fn putc(&self, c: u8) {
        while self.read_reg(regs::LSR) & LSR_THRE == 0 {
            core::hint::spin_loop();
        }
        self.write_reg(regs::THR, c as u32);
    }

    /// Transmit a string, expanding `\n` to CRLF.
    pub fn puts(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.putc(b'\r');
            }
            self.putc(byte);
        }
    }
}

impl Write for Uart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s);
        Ok(())
    }
}

// SAFETY: UART0 is always mapped on the HPS (device memory, identity mapped)
static UART: Mutex<Uart> = Mutex::new(unsafe { Uart::new(UART0_BASE) });

/// Program UART0 for the console line settings.
pub fn init() {
    UART.lock().init(UART_CLOCK_HZ, BAUD_RATE);
}

pub fn puts(s: &str) {
    UART.lock().puts(s);
}

pub fn _print(args: fmt::Arguments) {
    let _ = UART.lock().write_fmt(args);
}

/// Print to the console.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::uart::_print(format_args!($($arg)*))
    };
}

/// Print to the console with a newline.
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::print!("{}\n", format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_programs_divisor_and_line() {
        let mut block = [0u32; 8];
        let uart = unsafe { Uart::new(block.as_mut_ptr() as usize) };

        uart.init(UART_CLOCK_HZ, BAUD_RATE);

        // DLL/DLH share offsets with THR/IER; the last writes win in memory
        assert_eq!(block[regs::LCR / 4], lcr::WLEN_8N1);
        assert_eq!(block[regs::FCR / 4], 0b111);
        assert_eq!(block[regs::DLL / 4], 54);
        assert_eq!(block[regs::DLH / 4], 0);
    }

    #[test]
    fn newline_goes_out_as_crlf() {
        let mut block = [0u32; 8];
        block[regs::LSR / 4] = LSR_THRE;
        let mut uart = unsafe { Uart::new(block.as_mut_ptr() as usize) };

        write!(uart, "ok\n").unwrap();

        // Only the last byte survives in the holding register
        assert_eq!(block[regs::THR / 4], b'\n' as u32);
    }
}
