pub const TIMER_MESSAGE_ACTION: &str = "timer-message";

/// Body of the announce POST. It is JSON text sent under a form content type;
/// the receiving server has only ever been exercised with this exact payload.
pub const LEGACY_HELLO_BODY: &str = r#"{"action": "timer-message", "message": "HELLO"}"#;

pub const TERMINATING_ERROR: &str = "GPIO Timer is terminating.  Sorry!";

pub type FormParams = Vec<(String, String)>;

/// Messages a timer posts to `action.php`.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerMessage {
    Hello,
    Identified {
        lane_count: u8,
        timer: String,
        human: String,
        ident: String,
    },
    Heartbeat,
    Flags {
        timer: String,
        human: String,
    },
    Started,
    /// Lane times in seconds, lane 1 first. Empty lanes are `None`.
    Finished {
        roundid: u32,
        heat: u32,
        lanes: Vec<Option<f64>>,
    },
    Malfunction {
        detectable: bool,
        error: String,
    },
}

impl TimerMessage {
    pub fn name(&self) -> &'static str {
        match self {
            TimerMessage::Hello => "HELLO",
            TimerMessage::Identified { .. } => "IDENTIFIED",
            TimerMessage::Heartbeat => "HEARTBEAT",
            TimerMessage::Flags { .. } => "FLAGS",
            TimerMessage::Started => "STARTED",
            TimerMessage::Finished { .. } => "FINISHED",
            TimerMessage::Malfunction { .. } => "MALFUNCTION",
        }
    }

    pub fn params(&self) -> FormParams {
        let mut params = vec![
            pair("action", TIMER_MESSAGE_ACTION),
            pair("message", self.name()),
        ];

        match self {
            TimerMessage::Hello | TimerMessage::Heartbeat | TimerMessage::Started => {}
            TimerMessage::Identified {
                lane_count,
                timer,
                human,
                ident,
            } => {
                params.push(pair("lane_count", &lane_count.to_string()));
                params.push(pair("timer", timer));
                params.push(pair("human", human));
                params.push(pair("ident", ident));
            }
            TimerMessage::Flags { timer, human } => {
                params.push(pair("ports", ""));
                params.push((format!("device-{}", timer.replace('/', " ")), human.clone()));
            }
            TimerMessage::Finished {
                roundid,
                heat,
                lanes,
            } => {
                params.push(pair("roundid", &roundid.to_string()));
                params.push(pair("heat", &heat.to_string()));
                for (idx, time) in lanes.iter().enumerate() {
                    if let Some(time) = time {
                        params.push((format!("lane{}", idx + 1), format!("{time:.5}")));
                    }
                }
            }
            TimerMessage::Malfunction { detectable, error } => {
                params.push(pair("detectable", if *detectable { "1" } else { "0" }));
                params.push(pair("error", error));
            }
        }

        params
    }
}

pub fn login_params(name: &str, password: &str) -> FormParams {
    vec![
        pair("action", "role.login"),
        pair("name", name),
        pair("password", password),
    ]
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}
