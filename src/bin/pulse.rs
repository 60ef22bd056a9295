use log::error;
use std::process;
use std::sync::Arc;

use gpio_timer::AppConfig;
use gpio_timer::app::run_pulse;
use gpio_timer::backend::default_backend;

fn main() {
    env_logger::init();

    let config = AppConfig::from_args_or_env().unwrap_or_else(|e| {
        error!("Failed to load config: {e}");
        process::exit(e.exit_code());
    });

    let result = default_backend().and_then(|backend| run_pulse(&config.gpio, Arc::new(backend)));
    if let Err(e) = result {
        error!("pulse {} line {}: {e}", config.gpio.chip, config.gpio.line);
        process::exit(e.exit_code());
    }
}
