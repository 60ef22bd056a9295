use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use log::{error, info};

use crate::config::{DerbyNetConfig, LineConfig};
use crate::derbynet::Notifier;
use crate::error::AppError;
use crate::gpio::{GpioBackend, LineDriver};
use crate::greeting::Greeting;
use crate::remote_log::RemoteLogBuffer;

/// Drive the configured line low once and release it.
pub fn run_pulse<B: GpioBackend>(config: &LineConfig, backend: Arc<B>) -> Result<(), AppError> {
    LineDriver::new(config.clone(), backend).pulse_low()
}

/// Probe (when configured) and announce, writing each response body on its
/// own line, then the greeting. Request failures are logged and skipped.
pub async fn run_notify<W: Write>(config: &DerbyNetConfig, out: &mut W) -> Result<(), AppError> {
    let greeting = Greeting::new();

    match Notifier::new(config.clone()) {
        Ok(notifier) => {
            match notifier.probe().await {
                Ok(Some(body)) => writeln!(out, "{body}")?,
                Ok(None) => {}
                Err(e) => error!("probe failed: {e}"),
            }
            match notifier.announce().await {
                Ok(body) => writeln!(out, "{body}")?,
                Err(e) => error!("announce to {} failed: {e}", config.action_url()),
            }
        }
        Err(e) => error!("http client: {e}"),
    }

    writeln!(out, "{}", greeting.message())?;
    Ok(())
}

/// Log in, introduce the timer and keep it alive with heartbeats, then sign
/// off with a MALFUNCTION so the server stops waiting on results. Captured
/// lines in `remote_log` are posted while the server asks for them.
pub async fn run_timer(
    config: &DerbyNetConfig,
    ident: &str,
    remote_log: Arc<RemoteLogBuffer>,
) -> Result<(), AppError> {
    let notifier = Notifier::with_remote_log(config.clone(), remote_log)?;

    notifier.login().await?;
    notifier.hello().await?;
    notifier.identified(ident).await?;

    let interval = Duration::from_secs(config.heartbeat_interval);
    for beat in 1..=config.heartbeat_count {
        notifier.heartbeat().await?;
        if beat == config.heartbeat_count {
            break;
        }

        // heartbeats stay one interval apart even when a heat wakes us early
        let since = Instant::now();
        if notifier.wait_for_heat(interval).await {
            info!("heat {} is staged", notifier.current_heat().heat);
        }
        tokio::time::sleep(interval.saturating_sub(since.elapsed())).await;
    }

    notifier.terminate().await?;
    Ok(())
}
