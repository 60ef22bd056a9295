use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("GPIO error: {0}")]
    Gpio(String),
    #[error("Line busy: {0}")]
    LineBusy(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Exit code used by the binaries when a run fails.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 78,
            AppError::Gpio(_) | AppError::LineBusy(_) | AppError::Io(_) => 74,
            AppError::InvalidValue(_) => 64,
            AppError::Http(_) | AppError::Protocol(_) => 69,
        }
    }
}
