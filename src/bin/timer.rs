use log::{error, info};
use std::process;
use std::sync::Arc;

use gpio_timer::app::run_timer;
use gpio_timer::{AppConfig, RemoteLogBuffer, remote_log};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let buffer = Arc::new(RemoteLogBuffer::default());
    if let Err(e) = remote_log::init(buffer.clone()) {
        eprintln!("logger already installed: {e}");
    }

    let config = AppConfig::from_args_or_env().unwrap_or_else(|e| {
        error!("Failed to load config: {e}");
        process::exit(e.exit_code());
    });

    info!(
        "Starting timer session against {}...",
        config.derbynet.action_url()
    );
    if let Err(e) = run_timer(&config.derbynet, env!("CARGO_PKG_VERSION"), buffer).await {
        error!("timer session ended: {e}");
    }
}
