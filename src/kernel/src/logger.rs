//! Kernel log sink.
//!
//! Routes the `log` facade to COM1 as `[LEVEL] target: message` lines. The
//! maximum level is fixed at build time by the `log-trace`, `log-info` and
//! `no-logs` features.

use crate::serial_println;
use log::{LevelFilter, Log, Metadata, Record};

struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        serial_println!(
            "[{:<5}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Level selected by the enabled log feature.
pub const fn level_filter() -> LevelFilter {
    if cfg!(feature = "no-logs") {
        LevelFilter::Off
    } else if cfg!(feature = "log-trace") {
        LevelFilter::Trace
    } else if cfg!(feature = "log-info") {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    }
}

/// Installs the serial logger. Later calls are ignored.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_filter());
    }
}
