//! Client side of the admission API.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// Which gate the watcher is mounted on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Entry,
    Exit,
}

impl Direction {
    /// API route notified for this direction.
    pub fn route(self) -> &'static str {
        match self {
            Direction::Entry => "/api/entrada",
            Direction::Exit => "/api/salida",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        })
    }
}

/// How the admission service answered a notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    Accepted,
    /// 403: the plate is not in the registry.
    Unregistered,
    /// 409: facility full or vehicle already inside.
    Conflict(String),
    /// 404 on exit: the vehicle has no open visit.
    NoOpenSession,
    /// Any other status.
    Rejected { status: u16, message: String },
}

impl NotifyOutcome {
    fn from_status(status: u16, message: String) -> Self {
        match status {
            200..=299 => NotifyOutcome::Accepted,
            403 => NotifyOutcome::Unregistered,
            409 => NotifyOutcome::Conflict(message),
            404 => NotifyOutcome::NoOpenSession,
            _ => NotifyOutcome::Rejected { status, message },
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("admission service {url} unreachable: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },
}

/// Something that forwards a read plate to the admission controller.
pub trait AdmissionNotifier {
    fn notify(&self, plate: &str, direction: Direction) -> Result<NotifyOutcome, NotifyError>;
}

/// Posts plates to a running `parkgate serve` instance.
pub struct AdmissionClient {
    base_url: String,
    agent: ureq::Agent,
}

impl AdmissionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl AdmissionNotifier for AdmissionClient {
    fn notify(&self, plate: &str, direction: Direction) -> Result<NotifyOutcome, NotifyError> {
        let url = format!("{}{}", self.base_url, direction.route());
        let response = match self
            .agent
            .post(&url)
            .send_json(json!({ "matricula": plate }))
        {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(NotifyError::Transport {
                    url,
                    source: Box::new(transport),
                })
            }
        };

        let status = response.status();
        let message = response
            .into_json::<Value>()
            .ok()
            .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default();
        debug!("{url} answered {status} for {plate}");
        Ok(NotifyOutcome::from_status(status, message))
    }
}
