use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::LineConfig;
use crate::error::AppError;

pub const LOW: u8 = 0;
pub const HIGH: u8 = 1;

/// Exclusive access to output lines. A line must be requested before it can be
/// written and stays owned until released.
pub trait GpioBackend: Send + Sync {
    fn request_output(&self, line: &LineConfig, initial: u8) -> Result<(), AppError>;
    fn write_value(&self, line: &LineConfig, value: u8) -> Result<(), AppError>;
    fn read_value(&self, line: &LineConfig) -> Result<u8, AppError>;
    fn release(&self, line: &LineConfig) -> Result<(), AppError>;
}

pub struct LineDriver<B: GpioBackend> {
    config: LineConfig,
    backend: Arc<B>,
}

impl<B: GpioBackend> LineDriver<B> {
    pub fn new(config: LineConfig, backend: Arc<B>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    /// Drive the line low, hold, drive it low again and release it.
    pub fn pulse_low(&self) -> Result<(), AppError> {
        self.hold(LOW, self.config.hold())
    }

    /// Request the line with `value` as its initial level, keep it for
    /// `duration`, write `value` once more and release. The line is released
    /// even when the write fails.
    pub fn hold(&self, value: u8, duration: Duration) -> Result<(), AppError> {
        if value > HIGH {
            return Err(AppError::InvalidValue("Value must be 0 or 1".into()));
        }

        let cfg = &self.config;
        self.backend.request_output(cfg, value)?;
        info!(
            "requested {} line {} as output, value {value}",
            cfg.chip, cfg.line
        );

        if !duration.is_zero() {
            debug!("holding line {} for {duration:?}", cfg.line);
            std::thread::sleep(duration);
        }

        let written = self.backend.write_value(cfg, value);
        let released = self.backend.release(cfg);
        if let Err(e) = &released {
            warn!("release {} line {}: {e}", cfg.chip, cfg.line);
        }
        written?;
        released?;

        info!("released {} line {}", cfg.chip, cfg.line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockGpioBackend;

    fn driver() -> (LineDriver<MockGpioBackend>, Arc<MockGpioBackend>) {
        let backend = Arc::new(MockGpioBackend::default());
        (
            LineDriver::new(LineConfig::default(), backend.clone()),
            backend,
        )
    }

    #[test]
    fn pulse_low_writes_low_and_releases() {
        let (driver, backend) = driver();
        driver.pulse_low().expect("pulse succeeds");

        let cfg = driver.config();
        assert!(!backend.is_held(cfg));
        assert_eq!(backend.last_value(cfg), Some(LOW));
        assert_eq!(backend.levels(cfg), vec![LOW, LOW]);
    }

    #[test]
    fn rejects_non_binary_value() {
        let (driver, backend) = driver();
        let err = driver.hold(2, Duration::ZERO).unwrap_err();
        assert!(matches!(err, AppError::InvalidValue(_)));
        assert!(backend.levels(driver.config()).is_empty());
    }

    #[test]
    fn busy_line_is_reported() {
        let (driver, backend) = driver();
        backend
            .request_output(driver.config(), HIGH)
            .expect("first owner");
        let err = driver.pulse_low().unwrap_err();
        assert!(matches!(err, AppError::LineBusy(_)));
        assert!(backend.is_held(driver.config()));
    }
}
