//! Camera poll loop: frame, plate reads, admission notification.

use crate::camera::{CameraError, FrameSource};
use crate::notify::{AdmissionNotifier, Direction, NotifyOutcome};
use log::{debug, info, warn};
use parkgate_plate::{PlateDetector, PlateText, ReadError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Longest uninterrupted sleep between stop-flag checks.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Read(#[from] ReadError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Base URL of the admission API.
    pub admission_url: String,
    pub direction: Direction,
    pub poll_interval_ms: u64,
    pub notify_timeout_ms: u64,
    /// A plate already notified within this window is not sent again.
    pub repeat_window_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            admission_url: "http://127.0.0.1:5000".to_string(),
            direction: Direction::Entry,
            poll_interval_ms: 1000,
            notify_timeout_ms: 5000,
            repeat_window_secs: 30,
        }
    }
}

/// What one pass saw and did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PassReport {
    pub frame: bool,
    /// Plates read in the frame, in detection order.
    pub plates: Vec<PlateText>,
    /// Plates sent to the admission service and its answers.
    pub notified: Vec<(PlateText, NotifyOutcome)>,
    /// Plates whose notification never reached the service. They are
    /// retried on the next pass that reads them.
    pub failed: Vec<PlateText>,
}

/// Drives [`PlateDetector`] over a [`FrameSource`], one frame at a time.
pub struct Watcher<S, N> {
    source: S,
    detector: PlateDetector,
    notifier: N,
    config: WatchConfig,
    recent: HashMap<String, Instant>,
}

impl<S: FrameSource, N: AdmissionNotifier> Watcher<S, N> {
    pub fn new(source: S, detector: PlateDetector, notifier: N, config: WatchConfig) -> Self {
        Self {
            source,
            detector,
            notifier,
            config,
            recent: HashMap::new(),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Run one frame through the pipeline and notify every new plate.
    ///
    /// A failed notification is logged and recorded in the report; the
    /// remaining plates of the frame are still notified.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn poll_once(&mut self) -> Result<PassReport, WatchError> {
        let mut report = PassReport::default();
        let Some(frame) = self.source.next_frame()? else {
            debug!("no frame this cycle");
            return Ok(report);
        };
        report.frame = true;

        let reads = self.detector.detect(&frame)?;
        let now = Instant::now();
        let window = Duration::from_secs(self.config.repeat_window_secs);
        self.recent.retain(|_, sent| now.duration_since(*sent) < window);

        for read in reads {
            report.plates.push(read.text.clone());
            if self.recent.contains_key(read.text.as_str()) {
                debug!("{} already notified, skipping", read.text);
                continue;
            }
            let outcome = match self.notifier.notify(read.text.as_str(), self.config.direction) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!("{} {} not delivered: {err}", self.config.direction, read.text);
                    report.failed.push(read.text);
                    continue;
                }
            };
            match &outcome {
                NotifyOutcome::Accepted => info!("{} {} accepted", self.config.direction, read.text),
                other => info!("{} {} refused: {other:?}", self.config.direction, read.text),
            }
            self.recent.insert(read.text.as_str().to_string(), now);
            report.notified.push((read.text, outcome));
        }
        Ok(report)
    }

    /// Poll until `stop` is set. Errors are logged and the next cycle retries.
    ///
    /// Returns the number of completed passes.
    pub fn run(&mut self, stop: &AtomicBool) -> usize {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut passes = 0;
        info!(
            "watching for {} plates every {} ms",
            self.config.direction, self.config.poll_interval_ms
        );
        while !stop.load(Ordering::Relaxed) {
            match self.poll_once() {
                Ok(report) if !report.plates.is_empty() => {
                    debug!("pass {passes}: {} plate(s)", report.plates.len())
                }
                Ok(_) => {}
                Err(err) => warn!("pass {passes} failed: {err}"),
            }
            passes += 1;
            sleep_unless_stopped(interval, stop);
        }
        info!("watcher stopped after {passes} passes");
        passes
    }
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return;
        }
        thread::sleep(left.min(SLEEP_SLICE));
    }
}
