use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::AppError;

const ROOT: &[u8] = b"action-response";
const IGNORED: [&str; 4] = ["remote-start", "assign-flag", "assign-port", "assign-device"];

/// Race heat announced by the server, taken from `<heat-ready>` attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeatReady {
    /// Bit per occupied lane, lane 1 is bit 0.
    pub lane_mask: u32,
    pub class: String,
    pub round: u32,
    pub roundid: u32,
    pub heat: u32,
}

impl HeatReady {
    pub fn lane_occupied(&self, lane: u32) -> bool {
        (1..=32).contains(&lane) && self.lane_mask & (1 << (lane - 1)) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionResponse {
    pub heat_ready: Option<HeatReady>,
    /// `Some(send)` when the server toggled remote logging.
    pub remote_log: Option<bool>,
    pub failures: Vec<Failure>,
    pub success: Option<String>,
    pub abort: bool,
    pub query: bool,
    /// Requests this timer does not act on.
    pub ignored: Vec<String>,
}

#[derive(Clone, Copy)]
enum Target {
    Failure,
    Success,
    Other,
}

impl ActionResponse {
    pub fn parse(xml: &str) -> Result<Self, AppError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut response = ActionResponse::default();
        let mut seen_root = false;
        let mut target = Target::Other;

        loop {
            let event = reader.read_event().map_err(|e| {
                AppError::Protocol(format!(
                    "action-response at byte {}: {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) if !seen_root => {
                    if e.name().as_ref() != ROOT {
                        return Err(AppError::Protocol(format!(
                            "unexpected root element {}",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                    seen_root = true;
                }
                Event::Start(ref e) => target = response.open(e)?,
                Event::Empty(ref e) => {
                    response.open(e)?;
                }
                Event::Text(ref t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| AppError::Protocol(format!("action-response text: {e}")))?;
                    match target {
                        Target::Failure => {
                            if let Some(failure) = response.failures.last_mut() {
                                failure.message.push_str(&text);
                            }
                        }
                        Target::Success => {
                            if let Some(success) = response.success.as_mut() {
                                success.push_str(&text);
                            }
                        }
                        Target::Other => {}
                    }
                }
                Event::End(_) => target = Target::Other,
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(AppError::Protocol("missing action-response element".into()));
        }
        Ok(response)
    }

    fn open(&mut self, e: &BytesStart) -> Result<Target, AppError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        match name.as_str() {
            "heat-ready" => {
                let mut heat = HeatReady::default();
                for (key, value) in attributes(e)? {
                    match key.as_str() {
                        "lane-mask" => heat.lane_mask = number(&key, &value)?,
                        "class" => heat.class = value,
                        "round" => heat.round = number(&key, &value)?,
                        "roundid" => heat.roundid = number(&key, &value)?,
                        "heat" => heat.heat = number(&key, &value)?,
                        _ => {}
                    }
                }
                self.heat_ready = Some(heat);
            }
            "remote-log" => {
                let send = attributes(e)?
                    .into_iter()
                    .find(|(key, _)| key == "send")
                    .map(|(_, value)| matches!(value.as_str(), "true" | "1"))
                    .unwrap_or(false);
                self.remote_log = Some(send);
            }
            "failure" => {
                let code = attributes(e)?
                    .into_iter()
                    .find(|(key, _)| key == "code")
                    .map(|(_, value)| value)
                    .unwrap_or_default();
                self.failures.push(Failure {
                    code,
                    message: String::new(),
                });
                return Ok(Target::Failure);
            }
            "success" => {
                self.success = Some(String::new());
                return Ok(Target::Success);
            }
            "abort" => self.abort = true,
            "query" => self.query = true,
            other if IGNORED.contains(&other) => self.ignored.push(name),
            _ => {}
        }
        Ok(Target::Other)
    }
}

/// Byte count from the log page reply, a `<success>N bytes</success>` element
/// that may stand alone or sit inside an `<action-response>`.
pub fn log_reply_bytes(xml: &str) -> Option<usize> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_success = false;
    let mut text = String::new();
    loop {
        match reader.read_event().ok()? {
            Event::Start(ref e) if e.name().as_ref() == b"success" => in_success = true,
            Event::Text(ref t) if in_success => text.push_str(&t.unescape().ok()?),
            Event::End(ref e) if e.name().as_ref() == b"success" => break,
            Event::Eof => return None,
            _ => {}
        }
    }
    text.split_whitespace().next()?.parse().ok()
}

fn attributes(e: &BytesStart) -> Result<Vec<(String, String)>, AppError> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| AppError::Protocol(format!("attribute: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| AppError::Protocol(format!("attribute {key}: {e}")))?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn number(key: &str, value: &str) -> Result<u32, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Protocol(format!("attribute {key} is not a number: {value}")))
}
