//! Boot console.
//!
//! A single PL011 behind a spinlock, plus a `log` backend that prints every
//! record to it. Until [`init`] runs there is no UART; output is dropped.

use core::fmt::{self, Write};
use lazy_static::lazy_static;
use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use super::serial::amba_pl011::Pl011;

lazy_static! {
    pub static ref WRITER: Mutex<Option<Pl011>> = Mutex::new(None);
}

/// Console logger
struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(uart) = WRITER.lock().as_mut() {
            let _ = write_record(uart, record);
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// `LEVEL [target] message` followed by a newline.
fn write_record(out: &mut impl Write, record: &Record) -> fmt::Result {
    let level_str = match record.level() {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    };
    writeln!(out, "{} [{}] {}", level_str, record.target(), record.args())
}

/// Bring up the console UART and route `log` output to it.
///
/// # Safety
///
/// `base` must map a PL011 that nothing else drives.
pub unsafe fn init(base: usize, clock_hz: u32, baud: u32) {
    // SAFETY: forwarded from the caller
    let mut uart = unsafe { Pl011::new(base) };
    uart.init(clock_hz, baud);
    *WRITER.lock() = Some(uart);

    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Info))
        .ok();
}

/// Print implementation that acquires the console lock
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if let Some(uart) = WRITER.lock().as_mut() {
        let _ = uart.write_fmt(args);
    }
}
