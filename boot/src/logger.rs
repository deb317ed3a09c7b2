//! logger.rs — `log` backend over the serial console
//!
//! Lines go out as `[info] clock: PLL running at 360 MHz\r\n`. Nothing is
//! buffered or allocated; a line is formatted straight into the sink while
//! the sink lock is held, so lines never interleave. Output is best-effort:
//! with no sink installed records are dropped.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// Byte-at-a-time output, typically a UART transmit register.
pub trait ByteSink: Send {
    fn put(&mut self, byte: u8);
}

struct LineWriter<'a>(&'a mut dyn ByteSink);

impl Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.0.put(b'\r');
            }
            self.0.put(b);
        }
        Ok(())
    }
}

const fn tag(level: Level) -> &'static str {
    match level {
        Level::Error => "fail",
        Level::Warn => "warn",
        Level::Info => "info",
        Level::Debug | Level::Trace => "dbg",
    }
}

pub struct SerialLogger {
    sink: Mutex<Option<&'static mut dyn ByteSink>>,
    level: LevelFilter,
}

impl SerialLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self { sink: Mutex::new(None), level }
    }

    pub fn attach(&self, sink: &'static mut dyn ByteSink) {
        *self.sink.lock() = Some(sink);
    }

    /// Write raw text with no prefix.
    pub fn write_raw(&self, text: &str) {
        if let Some(sink) = self.sink.lock().as_mut() {
            let _ = LineWriter(&mut **sink).write_str(text);
        }
    }
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = self.sink.lock().as_mut() {
            let mut w = LineWriter(&mut **sink);
            let _ = writeln!(w, "[{}] {}: {}", tag(record.level()), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

#[cfg(feature = "logging")]
const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;
#[cfg(not(feature = "logging"))]
const DEFAULT_LEVEL: LevelFilter = LevelFilter::Warn;

static LOGGER: SerialLogger = SerialLogger::new(DEFAULT_LEVEL);

/// Route the `log` macros to `sink`.
pub fn install(sink: &'static mut dyn ByteSink) -> Result<(), &'static str> {
    log::set_logger(&LOGGER).map_err(|_| "logger already installed")?;
    LOGGER.attach(sink);
    log::set_max_level(DEFAULT_LEVEL);
    Ok(())
}

/// Unprefixed text on the console, for the banner.
pub fn raw(text: &str) {
    LOGGER.write_raw(text);
}

pub fn log_info(tag: &str, msg: &str) {
    log::info!(target: tag, "{}", msg);
}

pub fn log_warn(tag: &str, msg: &str) {
    log::warn!(target: tag, "{}", msg);
}

pub fn log_critical(tag: &str, msg: &str) {
    log::error!(target: tag, "{}", msg);
}
