//! Mirror of this crate's log lines for the DerbyNet server log page.
//!
//! `TeeLogger` hands every record to `env_logger` and, while the server has
//! asked for remote logging, also keeps the crate's own lines in a
//! `RemoteLogBuffer`. The `Notifier` drains that buffer after each exchange.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{Level, Log, Metadata, Record, SetLoggerError};
use parking_lot::Mutex;

const CAPTURE_LEVEL: Level = Level::Info;

#[derive(Default)]
pub struct RemoteLogBuffer {
    enabled: AtomicBool,
    lines: Mutex<Vec<String>>,
}

impl RemoteLogBuffer {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Returns the previous state. Turning capture off drops pending lines.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let previous = self.enabled.swap(enabled, Ordering::Relaxed);
        if !enabled {
            self.lines.lock().clear();
        }
        previous
    }

    pub fn push(&self, line: String) {
        if self.is_enabled() {
            self.lines.lock().push(line);
        }
    }

    /// Pending lines joined into one newline terminated text block.
    pub fn drain(&self) -> Option<String> {
        let lines = std::mem::take(&mut *self.lines.lock());
        if lines.is_empty() {
            return None;
        }
        let mut text = lines.join("\n");
        text.push('\n');
        Some(text)
    }
}

pub struct TeeLogger {
    inner: env_logger::Logger,
    buffer: Arc<RemoteLogBuffer>,
}

impl TeeLogger {
    pub fn new(inner: env_logger::Logger, buffer: Arc<RemoteLogBuffer>) -> Self {
        Self { inner, buffer }
    }

    fn captures(&self, metadata: &Metadata) -> bool {
        metadata.level() <= CAPTURE_LEVEL
            && metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
            && self.buffer.is_enabled()
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata) || self.captures(metadata)
    }

    fn log(&self, record: &Record) {
        if self.inner.enabled(record.metadata()) {
            self.inner.log(record);
        }
        if self.captures(record.metadata()) {
            self.buffer
                .push(format!("[{}] {}", record.level(), record.args()));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install `env_logger` (configured from `RUST_LOG`) behind a `TeeLogger`
/// feeding `buffer`.
pub fn init(buffer: Arc<RemoteLogBuffer>) -> Result<(), SetLoggerError> {
    let inner = env_logger::Builder::from_default_env().build();
    let max_level = inner.filter().max(CAPTURE_LEVEL.to_level_filter());
    log::set_boxed_logger(Box::new(TeeLogger::new(inner, buffer)))?;
    log::set_max_level(max_level);
    Ok(())
}
