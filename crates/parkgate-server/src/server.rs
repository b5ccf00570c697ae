use crate::router::{handle, ApiResponse};
use log::{debug, info, warn};
use parkgate_admission::AdmissionController;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Request, Response};

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("cannot listen on {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub workers: usize,
    /// Larger request bodies are answered with 413.
    pub max_body_bytes: usize,
    /// How often idle workers look at the stop flag.
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            workers: 4,
            max_body_bytes: 16 * 1024,
            poll_interval_ms: 200,
        }
    }
}

/// Blocking HTTP front end of an [`AdmissionController`].
pub struct AdmissionServer {
    http: tiny_http::Server,
    controller: Arc<AdmissionController>,
    config: ServerConfig,
}

impl AdmissionServer {
    pub fn bind(
        config: ServerConfig,
        controller: Arc<AdmissionController>,
    ) -> Result<Self, ServerError> {
        let http = tiny_http::Server::http(&config.bind).map_err(|e| ServerError::Bind {
            addr: config.bind.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            http,
            controller,
            config,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.http.server_addr().to_ip()
    }

    /// Serve until `stop` is set. Requests already being handled finish.
    pub fn run(&self, stop: &AtomicBool) -> Result<(), ServerError> {
        let workers = self.config.workers.max(1);
        info!(
            "admission API listening on {} with {workers} workers",
            self.local_addr()
                .map_or_else(|| self.config.bind.clone(), |a| a.to_string())
        );
        thread::scope(|scope| {
            for id in 0..workers {
                thread::Builder::new()
                    .name(format!("http-{id}"))
                    .spawn_scoped(scope, || self.worker(stop))?;
            }
            Ok::<_, std::io::Error>(())
        })?;
        info!("admission API stopped");
        Ok(())
    }

    fn worker(&self, stop: &AtomicBool) {
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        while !stop.load(Ordering::Relaxed) {
            match self.http.recv_timeout(poll) {
                Ok(Some(request)) => self.serve(request),
                Ok(None) => {}
                Err(err) => warn!("accept failed: {err}"),
            }
        }
    }

    fn serve(&self, mut request: Request) {
        let method = request.method().clone();
        let url = request.url().to_string();

        let response = match read_body(&mut request, self.config.max_body_bytes) {
            Ok(body) => handle(&self.controller, &method, &url, &body),
            Err(resp) => resp,
        };
        info!("{method} {url} -> {}", response.status);
        debug!("response body {}", response.body);

        let mut reply =
            Response::from_string(response.body.to_string()).with_status_code(response.status);
        if let Ok(header) = "Content-Type: application/json".parse::<Header>() {
            reply = reply.with_header(header);
        }
        if let Err(err) = request.respond(reply) {
            warn!("failed to send response to {url}: {err}");
        }
    }
}

fn read_body(request: &mut Request, limit: usize) -> Result<Vec<u8>, ApiResponse> {
    if request.body_length().is_some_and(|n| n > limit) {
        return Err(ApiResponse::error(413, "request body too large"));
    }
    let mut body = Vec::new();
    request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|e| ApiResponse::error(400, format!("unreadable body: {e}")))?;
    if body.len() > limit {
        return Err(ApiResponse::error(413, "request body too large"));
    }
    Ok(body)
}
