// =============================================================================
// C5BOOT - Console Logger
// =============================================================================
// `log` backend writing `[LEVEL] message` lines to the UART console.
// =============================================================================

use arch::uart;
use core::fmt::Write;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Formats into a fixed stack buffer so a record goes out in one `puts`.
struct LineBuffer {
    data: [u8; 160],
    len: usize,
}

impl LineBuffer {
    const fn new() -> Self {
        Self { data: [0; 160], len: 0 }
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.data[..self.len]).unwrap_or("<invalid>")
    }
}

impl Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        // Truncate on a char boundary so as_str stays valid
        let mut take = s.len().min(self.data.len() - self.len);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.data[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };

        let mut line = LineBuffer::new();
        let _ = writeln!(line, "[{}] {}", level, record.args());
        uart::puts(line.as_str());
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Install the console logger with `level` as the ceiling.
pub fn init(level: LevelFilter) {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(level))
        .ok();
}
