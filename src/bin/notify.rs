use log::error;
use std::io;
use std::process;

use gpio_timer::AppConfig;
use gpio_timer::app::run_notify;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let config = AppConfig::from_args_or_env().unwrap_or_else(|e| {
        error!("Failed to load config: {e}");
        process::exit(e.exit_code());
    });

    // request outcomes never change the exit status
    if let Err(e) = run_notify(&config.derbynet, &mut io::stdout().lock()).await {
        error!("notify: {e}");
    }
}
