use log::debug;
use std::io;

use libgpiod::{chip::Chip, line, request};
use parking_lot::{FairMutex, RwLock};
use rustc_hash::FxHashMap;

use crate::config::LineConfig;
use crate::error::AppError;
use crate::gpio::{GpioBackend, HIGH};

/// Lines requested through the GPIO character device. Dropping a handle
/// releases its request.
pub struct LibgpiodBackend {
    lines: RwLock<FxHashMap<(String, u32), FairMutex<GpiodHandle>>>, // keyed by chip and offset
}

struct GpiodHandle {
    offset: u32,
    request: request::Request,
}

impl GpiodHandle {
    fn new(cfg: &LineConfig, initial: line::Value) -> Result<Self, AppError> {
        let chip = Self::open_chip(cfg)?;
        let line_cfg = Self::make_line_config(cfg.line, initial)?;
        let request = Self::request_lines(&chip, &cfg.consumer, &line_cfg).map_err(|e| {
            let msg = format!("request {} line {}: {e}", cfg.chip, cfg.line);
            if is_busy(&e) {
                AppError::LineBusy(msg)
            } else {
                AppError::Gpio(msg)
            }
        })?;
        Ok(Self {
            offset: cfg.line,
            request,
        })
    }

    fn open_chip(cfg: &LineConfig) -> Result<Chip, AppError> {
        let path = cfg.chip_path();
        Chip::open(&path)
            .map_err(|e| AppError::Gpio(format!("open chip {}: {e}", path.display())))
    }

    fn make_line_config(offset: u32, initial: line::Value) -> Result<line::Config, AppError> {
        let mut ls =
            line::Settings::new().map_err(|e| AppError::Gpio(format!("libgpiod settings: {e}")))?;
        ls.set_direction(line::Direction::Output)
            .map_err(|e| AppError::Gpio(format!("set direction: {e}")))?;
        ls.set_output_value(initial)
            .map_err(|e| AppError::Gpio(format!("set output value: {e}")))?;

        let mut cfg =
            line::Config::new().map_err(|e| AppError::Gpio(format!("line config: {e}")))?;
        cfg.add_line_settings(&[offset], ls)
            .map_err(|e| AppError::Gpio(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }

    fn request_lines(
        chip: &Chip,
        consumer: &str,
        line_cfg: &line::Config,
    ) -> libgpiod::Result<request::Request> {
        let mut req_cfg = request::Config::new()?;
        req_cfg.set_consumer(consumer)?;
        chip.request_lines(Some(&req_cfg), line_cfg)
    }
}

fn is_busy(e: &libgpiod::Error) -> bool {
    matches!(e, libgpiod::Error::OperationFailed(_, errno) if busy_errno(errno.0))
}

fn busy_errno(code: i32) -> bool {
    io::Error::from_raw_os_error(code).kind() == io::ErrorKind::ResourceBusy
}

fn to_line_value(value: u8) -> line::Value {
    match value {
        0 => line::Value::InActive,
        _ => line::Value::Active,
    }
}

impl LibgpiodBackend {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            lines: RwLock::new(FxHashMap::default()),
        })
    }

    fn key(cfg: &LineConfig) -> (String, u32) {
        (cfg.chip.clone(), cfg.line)
    }

    fn not_requested(cfg: &LineConfig) -> AppError {
        AppError::Gpio(format!("{} line {} not requested", cfg.chip, cfg.line))
    }
}

impl GpioBackend for LibgpiodBackend {
    fn request_output(&self, cfg: &LineConfig, initial: u8) -> Result<(), AppError> {
        if initial > HIGH {
            return Err(AppError::InvalidValue("Value must be 0 or 1".into()));
        }

        let mut lines = self.lines.write();
        if lines.contains_key(&Self::key(cfg)) {
            return Err(AppError::LineBusy(format!(
                "{} line {} already requested",
                cfg.chip, cfg.line
            )));
        }

        let handle = GpiodHandle::new(cfg, to_line_value(initial))?;
        lines.insert(Self::key(cfg), FairMutex::new(handle));
        Ok(())
    }

    fn write_value(&self, cfg: &LineConfig, value: u8) -> Result<(), AppError> {
        if value > HIGH {
            return Err(AppError::InvalidValue("Value must be 0 or 1".into()));
        }

        let lines = self.lines.read();
        let mut handle = lines
            .get(&Self::key(cfg))
            .ok_or_else(|| Self::not_requested(cfg))?
            .lock();
        let offset = handle.offset;
        handle
            .request
            .set_value(offset, to_line_value(value))
            .map_err(|e| AppError::Gpio(format!("set value: {e}")))?;
        Ok(())
    }

    fn read_value(&self, cfg: &LineConfig) -> Result<u8, AppError> {
        let lines = self.lines.read();
        let handle = lines
            .get(&Self::key(cfg))
            .ok_or_else(|| Self::not_requested(cfg))?
            .lock();

        let value = handle
            .request
            .value(handle.offset)
            .map_err(|e| AppError::Gpio(format!("get value: {e}")))?;
        Ok(match value {
            line::Value::InActive => 0,
            line::Value::Active => 1,
        })
    }

    fn release(&self, cfg: &LineConfig) -> Result<(), AppError> {
        let handle = self
            .lines
            .write()
            .remove(&Self::key(cfg))
            .ok_or_else(|| Self::not_requested(cfg))?;
        drop(handle);
        debug!("released request for {} line {}", cfg.chip, cfg.line);
        Ok(())
    }
}
