//! Client side of the DerbyNet timer protocol.
//!
//! Every request carries HTTP Basic credentials and shares one cookie store,
//! so a `login` is remembered by the messages that follow it.

pub mod message;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use tokio::sync::{Mutex as AsyncMutex, watch};

use crate::config::DerbyNetConfig;
use crate::error::AppError;
use crate::remote_log::RemoteLogBuffer;

pub use message::{LEGACY_HELLO_BODY, TERMINATING_ERROR, TimerMessage, login_params};
pub use response::{ActionResponse, Failure, HeatReady, log_reply_bytes};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub struct Notifier {
    config: DerbyNetConfig,
    client: Client,
    heat: Mutex<HeatReady>,
    remote_log: Arc<RemoteLogBuffer>,
    heat_tx: watch::Sender<u32>,
    heat_rx: AsyncMutex<watch::Receiver<u32>>,
}

impl Notifier {
    pub fn new(config: DerbyNetConfig) -> Result<Self, AppError> {
        Self::with_remote_log(config, Arc::new(RemoteLogBuffer::default()))
    }

    /// Notifier whose remote log requests switch capture on `remote_log`,
    /// usually the buffer behind the installed `TeeLogger`.
    pub fn with_remote_log(
        config: DerbyNetConfig,
        remote_log: Arc<RemoteLogBuffer>,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .cookie_store(true)
            .build()?;
        let (heat_tx, heat_rx) = watch::channel(0);

        Ok(Self {
            config,
            client,
            heat: Mutex::new(HeatReady::default()),
            remote_log,
            heat_tx,
            heat_rx: AsyncMutex::new(heat_rx),
        })
    }

    pub fn config(&self) -> &DerbyNetConfig {
        &self.config
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.config.username, Some(&self.config.password))
    }

    /// GET the configured probe URL and return its body, whatever the status.
    pub async fn probe(&self) -> Result<Option<String>, AppError> {
        let Some(url) = self.config.probe_url.as_deref() else {
            return Ok(None);
        };

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("probe {url} answered {status}");
        }
        Ok(Some(response.text().await?))
    }

    /// POST the fixed HELLO payload to the action endpoint and return the
    /// body, whatever the status.
    pub async fn announce(&self) -> Result<String, AppError> {
        let url = self.config.action_url();
        let response = self
            .authorized(self.client.post(&url))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(LEGACY_HELLO_BODY)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("announce to {url} answered {status}");
        }
        Ok(response.text().await?)
    }

    /// Log in with the timer role. The session cookie is kept for later
    /// messages.
    pub async fn login(&self) -> Result<String, AppError> {
        let params = login_params(&self.config.username, &self.config.password);
        let response = self
            .authorized(self.client.post(self.config.action_url()))
            .form(&params)
            .send()
            .await?;

        for cookie in response.cookies() {
            debug!("cookie received: {}={}", cookie.name(), cookie.value());
        }
        let body = response.error_for_status()?.text().await?;
        info!("login as {}: {body}", self.config.username);
        Ok(body)
    }

    pub async fn hello(&self) -> Result<ActionResponse, AppError> {
        self.send(TimerMessage::Hello).await
    }

    pub async fn identified(&self, ident: &str) -> Result<ActionResponse, AppError> {
        self.send(TimerMessage::Identified {
            lane_count: self.config.lane_count,
            timer: self.config.timer_id.clone(),
            human: self.config.human_name.clone(),
            ident: ident.to_string(),
        })
        .await
    }

    pub async fn heartbeat(&self) -> Result<ActionResponse, AppError> {
        self.send(TimerMessage::Heartbeat).await
    }

    pub async fn flags(&self) -> Result<ActionResponse, AppError> {
        self.send(self.flags_message()).await
    }

    pub async fn started(&self) -> Result<ActionResponse, AppError> {
        self.send(TimerMessage::Started).await
    }

    /// Report lane times for the current heat.
    pub async fn finished(&self, lanes: &[Option<f64>]) -> Result<ActionResponse, AppError> {
        let (roundid, heat) = {
            let current = self.heat.lock();
            (current.roundid, current.heat)
        };
        self.send(TimerMessage::Finished {
            roundid,
            heat,
            lanes: lanes.to_vec(),
        })
        .await
    }

    /// Wake any heat waiter and tell the server this timer is going away.
    pub async fn terminate(&self) -> Result<ActionResponse, AppError> {
        self.reset_heat();
        self.send(TimerMessage::Malfunction {
            detectable: false,
            error: TERMINATING_ERROR.to_string(),
        })
        .await
    }

    /// Wait for the server to announce a heat. A heat announced since the
    /// last wait returns at once. False on timeout or when the heat was
    /// aborted or the timer is terminating.
    pub async fn wait_for_heat(&self, timeout: Duration) -> bool {
        let mut rx = self.heat_rx.lock().await;
        match tokio::time::timeout(timeout, rx.changed()).await {
            Ok(Ok(())) => self.heat.lock().heat > 0,
            Ok(Err(_)) | Err(_) => false,
        }
    }

    pub fn current_heat(&self) -> HeatReady {
        self.heat.lock().clone()
    }

    pub fn remote_logging(&self) -> bool {
        self.remote_log.is_enabled()
    }

    /// Append `text` to the server side timer log. Returns the number of bytes
    /// the server acknowledged.
    pub async fn post_log(&self, text: &str) -> Result<usize, AppError> {
        let response = self
            .authorized(self.client.post(self.config.log_url()))
            .header(CONTENT_TYPE, "text/plain")
            .body(text.to_string())
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;

        Ok(log_reply_bytes(&body).unwrap_or(text.len()))
    }

    /// Post the log lines captured since the last flush. Nothing is sent
    /// unless the server asked for remote logging.
    pub async fn flush_remote_log(&self) -> Result<usize, AppError> {
        if !self.remote_logging() {
            return Ok(0);
        }
        match self.remote_log.drain() {
            Some(text) => self.post_log(&text).await,
            None => Ok(0),
        }
    }

    /// Post one timer message and act on the reply. A `query` in the reply is
    /// answered with a single FLAGS message.
    pub async fn send(&self, message: TimerMessage) -> Result<ActionResponse, AppError> {
        let response = self.post_message(&message).await?;
        if self.apply(message.name(), &response) {
            let flags = self.flags_message();
            let reply = self.post_message(&flags).await?;
            self.apply(flags.name(), &reply);
        }

        // failures here stay at debug so they are not captured and re-posted
        if let Err(e) = self.flush_remote_log().await {
            debug!("remote log post failed: {e}");
        }
        Ok(response)
    }

    async fn post_message(&self, message: &TimerMessage) -> Result<ActionResponse, AppError> {
        debug!("sending {}", message.name());
        let body = self
            .authorized(self.client.post(self.config.action_url()))
            .form(&message.params())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        if self.remote_logging() {
            debug!("{} response: {body}", message.name());
        }
        ActionResponse::parse(&body)
    }

    fn flags_message(&self) -> TimerMessage {
        TimerMessage::Flags {
            timer: self.config.timer_id.clone(),
            human: self.config.human_name.clone(),
        }
    }

    /// Returns true when the server asked for our flags.
    fn apply(&self, sent: &str, response: &ActionResponse) -> bool {
        if let Some(send) = response.remote_log
            && self.remote_log.set_enabled(send) != send
        {
            info!("remote logging {}", if send { "enabled" } else { "disabled" });
        }

        if let Some(heat) = &response.heat_ready {
            *self.heat.lock() = heat.clone();
            info!("Heat {} is ready.", heat.heat);
            self.signal_heat(heat.heat);
        }

        for failure in &response.failures {
            error!("{sent} rejected [{}]: {}", failure.code, failure.message);
        }

        if response.success.is_some() {
            debug!("{sent} successful");
        }

        if response.abort {
            info!("heat aborted by server");
            self.reset_heat();
        }

        for name in &response.ignored {
            debug!("{name} message ignored");
        }

        response.query
    }

    fn reset_heat(&self) {
        self.heat.lock().heat = 0;
        self.signal_heat(0);
    }

    /// Replaces any signal the waiter has not seen yet.
    fn signal_heat(&self, heat: u32) {
        self.heat_tx.send_replace(heat);
    }
}
