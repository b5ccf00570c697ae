//! Frame acquisition.

use image::RgbImage;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;

/// Payloads above this size are treated as undecodable.
const MAX_FRAME_BYTES: u64 = 16 * 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error("camera {url} unreachable: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },
    #[error("reading frame from {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Where the poll loop gets its frames.
///
/// `Ok(None)` means "nothing usable this cycle"; errors are infrastructure
/// failures the caller logs before retrying.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Snapshot endpoint answering `GET` with one encoded image.
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1/capture".to_string(),
            timeout_ms: 5000,
        }
    }
}

/// Snapshot camera reached over HTTP.
pub struct HttpCamera {
    url: String,
    agent: ureq::Agent,
}

impl HttpCamera {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(&config.url, Duration::from_millis(config.timeout_ms))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FrameSource for HttpCamera {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError> {
        let response = match self.agent.get(&self.url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                debug!("camera answered {status}, skipping cycle");
                return Ok(None);
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(CameraError::Transport {
                    url: self.url.clone(),
                    source: Box::new(transport),
                })
            }
        };

        let mut payload = Vec::new();
        response
            .into_reader()
            .take(MAX_FRAME_BYTES + 1)
            .read_to_end(&mut payload)
            .map_err(|source| CameraError::Io {
                url: self.url.clone(),
                source,
            })?;
        if payload.len() as u64 > MAX_FRAME_BYTES {
            debug!("frame larger than {MAX_FRAME_BYTES} bytes, skipping cycle");
            return Ok(None);
        }

        match image::load_from_memory(&payload) {
            Ok(decoded) => Ok(Some(decoded.to_rgb8())),
            Err(err) => {
                debug!("undecodable frame ({} bytes): {err}", payload.len());
                Ok(None)
            }
        }
    }
}
