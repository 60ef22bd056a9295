pub mod app;
pub mod backend;
pub mod config;
pub mod derbynet;
pub mod error;
pub mod gpio;
pub mod greeting;
pub mod remote_log;

pub use config::{AppConfig, DerbyNetConfig, LineConfig};
pub use derbynet::{ActionResponse, HeatReady, Notifier, TimerMessage};
pub use error::AppError;
pub use gpio::{GpioBackend, LineDriver};
pub use greeting::Greeting;
pub use remote_log::RemoteLogBuffer;

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodBackend;
pub use backend::MockGpioBackend;
