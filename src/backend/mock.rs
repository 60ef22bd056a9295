use std::sync::{Mutex, RwLock};

use rustc_hash::FxHashMap;

use crate::config::LineConfig;
use crate::error::AppError;
use crate::gpio::{GpioBackend, HIGH};

/// In-memory lines. Values survive release the way a kernel line keeps its
/// last driven level, and every level driven is recorded for inspection.
pub struct MockGpioBackend {
    lines: RwLock<FxHashMap<(String, u32), Mutex<MockLineState>>>, // keyed by chip and offset
    line_count: u32,
}

#[derive(Clone, Default)]
struct MockLineState {
    owner: Option<String>,
    value: u8,
    levels: Vec<u8>,
}

impl Default for MockGpioBackend {
    fn default() -> Self {
        Self::with_line_count(54)
    }
}

impl MockGpioBackend {
    /// Lines at or past `line_count` do not exist on any mock chip.
    pub fn with_line_count(line_count: u32) -> Self {
        Self {
            lines: RwLock::new(FxHashMap::default()),
            line_count,
        }
    }

    pub fn is_held(&self, line: &LineConfig) -> bool {
        self.inspect(line, |state| state.owner.is_some())
            .unwrap_or(false)
    }

    pub fn last_value(&self, line: &LineConfig) -> Option<u8> {
        self.inspect(line, |state| state.value)
    }

    pub fn levels(&self, line: &LineConfig) -> Vec<u8> {
        self.inspect(line, |state| state.levels.clone())
            .unwrap_or_default()
    }

    fn key(line: &LineConfig) -> (String, u32) {
        (line.chip.clone(), line.line)
    }

    fn inspect<T>(&self, line: &LineConfig, f: impl FnOnce(&MockLineState) -> T) -> Option<T> {
        let lines = self.lines.read().ok()?;
        let state = lines.get(&Self::key(line))?.lock().ok()?;
        Some(f(&state))
    }

    fn with_owned<T>(
        &self,
        line: &LineConfig,
        f: impl FnOnce(&mut MockLineState) -> T,
    ) -> Result<T, AppError> {
        let lines = self
            .lines
            .read()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;
        let entry = lines
            .get(&Self::key(line))
            .ok_or_else(|| AppError::Gpio(format!("line {} not requested", line.line)))?;
        let mut state = entry
            .lock()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;

        if state.owner.is_none() {
            return Err(AppError::Gpio(format!("line {} not requested", line.line)));
        }
        Ok(f(&mut state))
    }
}

impl GpioBackend for MockGpioBackend {
    fn request_output(&self, line: &LineConfig, initial: u8) -> Result<(), AppError> {
        if line.line >= self.line_count {
            return Err(AppError::Gpio(format!(
                "request lines: offset {} out of range on {}",
                line.line, line.chip
            )));
        }

        let mut lines = self
            .lines
            .write()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;
        let entry = lines
            .entry(Self::key(line))
            .or_insert_with(|| Mutex::new(MockLineState::default()));
        let mut state = entry
            .lock()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;

        if let Some(owner) = &state.owner {
            return Err(AppError::LineBusy(format!(
                "{} line {} held by {owner}",
                line.chip, line.line
            )));
        }

        let value = initial.min(HIGH);
        state.owner = Some(line.consumer.clone());
        state.value = value;
        state.levels.push(value);
        Ok(())
    }

    fn write_value(&self, line: &LineConfig, value: u8) -> Result<(), AppError> {
        if value > HIGH {
            return Err(AppError::InvalidValue("Value must be 0 or 1".into()));
        }
        self.with_owned(line, |state| {
            state.value = value;
            state.levels.push(value);
        })
    }

    fn read_value(&self, line: &LineConfig) -> Result<u8, AppError> {
        self.with_owned(line, |state| state.value)
    }

    fn release(&self, line: &LineConfig) -> Result<(), AppError> {
        self.with_owned(line, |state| {
            state.owner = None;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_requires_request() {
        let backend = MockGpioBackend::default();
        let line = LineConfig::default();
        assert!(matches!(
            backend.write_value(&line, 1),
            Err(AppError::Gpio(_))
        ));
    }

    #[test]
    fn value_persists_after_release() {
        let backend = MockGpioBackend::default();
        let line = LineConfig::default();
        backend.request_output(&line, 1).unwrap();
        assert_eq!(backend.read_value(&line).unwrap(), 1);
        backend.release(&line).unwrap();
        assert!(!backend.is_held(&line));
        assert_eq!(backend.last_value(&line), Some(1));
        assert!(backend.read_value(&line).is_err());
    }

    #[test]
    fn request_records_initial_level() {
        let backend = MockGpioBackend::default();
        let line = LineConfig::default();
        backend.request_output(&line, 1).unwrap();
        backend.write_value(&line, 0).unwrap();
        backend.release(&line).unwrap();
        assert_eq!(backend.levels(&line), vec![1, 0]);
    }

    #[test]
    fn missing_line_fails_request() {
        let backend = MockGpioBackend::with_line_count(8);
        let line = LineConfig::default();
        assert!(matches!(
            backend.request_output(&line, 0),
            Err(AppError::Gpio(_))
        ));
        assert_eq!(backend.last_value(&line), None);
    }
}
