use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const CONFIG_ENV: &str = "GPIO_TIMER_CONFIG";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LineConfig {
    pub chip: String,
    pub line: u32,
    pub consumer: String,
    pub hold_ms: u64,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            chip: "gpiochip0".into(),
            line: 17,
            consumer: env!("CARGO_PKG_NAME").into(),
            hold_ms: 0,
        }
    }
}

impl LineConfig {
    /// Character device path for the chip, `gpiochip0` -> `/dev/gpiochip0`.
    pub fn chip_path(&self) -> PathBuf {
        if self.chip.starts_with('/') {
            PathBuf::from(&self.chip)
        } else {
            Path::new("/dev").join(&self.chip)
        }
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DerbyNetConfig {
    pub base_url: String,
    pub action_path: String,
    pub log_path: String,
    pub username: String,
    pub password: String,
    pub timeout: u64,
    pub probe_url: Option<String>,
    pub lane_count: u8,
    pub timer_id: String,
    pub human_name: String,
    pub heartbeat_count: u32,
    pub heartbeat_interval: u64,
}

impl Default for DerbyNetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".into(),
            action_path: "/action.php".into(),
            log_path: "/post-timer-log.php".into(),
            username: "Timer".into(),
            password: String::new(),
            timeout: 5,
            probe_url: None,
            lane_count: 4,
            timer_id: "github.com/Nescient/gpio-timer".into(),
            human_name: "GPIO Timer".into(),
            heartbeat_count: 10,
            heartbeat_interval: 5,
        }
    }
}

impl DerbyNetConfig {
    pub fn action_url(&self) -> String {
        join_url(&self.base_url, &self.action_path)
    }

    pub fn log_url(&self) -> String {
        join_url(&self.base_url, &self.log_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub gpio: LineConfig,
    pub derbynet: DerbyNetConfig,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))
    }

    /// Config from the first CLI argument or `GPIO_TIMER_CONFIG`, built-in
    /// defaults when neither is given.
    pub fn from_args_or_env() -> Result<Self, AppError> {
        match std::env::args().nth(1).or_else(|| std::env::var(CONFIG_ENV).ok()) {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_board_wiring() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.gpio.chip_path(), PathBuf::from("/dev/gpiochip0"));
        assert_eq!(cfg.gpio.line, 17);
        assert_eq!(cfg.gpio.hold(), Duration::ZERO);
        assert_eq!(cfg.derbynet.action_url(), "http://localhost/action.php");
        assert_eq!(cfg.derbynet.username, "Timer");
        assert!(cfg.derbynet.password.is_empty());
        assert_eq!(cfg.derbynet.timeout, 5);
        assert!(cfg.derbynet.probe_url.is_none());
    }

    #[test]
    fn absolute_chip_path_is_kept() {
        let cfg = LineConfig {
            chip: "/dev/gpiochip4".into(),
            ..LineConfig::default()
        };
        assert_eq!(cfg.chip_path(), PathBuf::from("/dev/gpiochip4"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: AppConfig = serde_json::from_str(
            r#"{ "gpio": { "line": 4 }, "derbynet": { "base_url": "http://10.0.0.2/derbynet/" } }"#,
        )
        .expect("valid partial config");
        assert_eq!(cfg.gpio.line, 4);
        assert_eq!(cfg.gpio.chip, "gpiochip0");
        assert_eq!(
            cfg.derbynet.action_url(),
            "http://10.0.0.2/derbynet/action.php"
        );
        assert_eq!(
            cfg.derbynet.log_url(),
            "http://10.0.0.2/derbynet/post-timer-log.php"
        );
    }
}
