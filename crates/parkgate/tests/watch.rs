use image::{Rgb, RgbImage};
use parkgate::camera::{CameraError, FrameSource};
use parkgate::notify::{AdmissionClient, AdmissionNotifier, Direction, NotifyError, NotifyOutcome};
use parkgate::plate::{DetectorParams, OcrEngine, OcrError, OcrOptions, PlateDetector};
use parkgate::watch::{WatchConfig, WatchError, Watcher};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fill(frame: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for yy in y..y + h {
        for xx in x..x + w {
            frame.put_pixel(xx, yy, color);
        }
    }
}

/// Light plate with nine dark glyph blocks on a gray background.
fn plate_frame() -> RgbImage {
    let mut frame = RgbImage::from_pixel(360, 200, Rgb([60, 60, 60]));
    fill(&mut frame, 40, 50, 200, 60, Rgb([235, 235, 235]));
    for i in 0..9 {
        fill(&mut frame, 52 + i * 20, 63, 10, 34, Rgb([15, 15, 15]));
    }
    frame
}

/// Two plates, one above the other, each with glyph blocks.
fn two_plate_frame() -> RgbImage {
    let mut frame = RgbImage::from_pixel(360, 260, Rgb([60, 60, 60]));
    for (x, y) in [(40, 50), (100, 180)] {
        fill(&mut frame, x, y, 200, 60, Rgb([235, 235, 235]));
        for i in 0..9 {
            fill(&mut frame, x + 12 + i * 20, y + 13, 10, 34, Rgb([15, 15, 15]));
        }
    }
    frame
}

struct FixedOcr(&'static str);

/// Answers its replies in turn, starting over after the last one.
struct CyclingOcr {
    replies: Vec<&'static str>,
    next: Mutex<usize>,
}

impl OcrEngine for CyclingOcr {
    fn name(&self) -> &str {
        "cycling"
    }

    fn recognize(&self, _: &image::GrayImage, _: &OcrOptions) -> Result<String, OcrError> {
        let mut next = self.next.lock().expect("ocr lock");
        let reply = self.replies[*next % self.replies.len()];
        *next += 1;
        Ok(reply.to_string())
    }
}

impl OcrEngine for FixedOcr {
    fn name(&self) -> &str {
        "fixed"
    }

    fn recognize(&self, _: &image::GrayImage, _: &OcrOptions) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}

enum Shot {
    Frame(RgbImage),
    Nothing,
    Down,
}

/// Plays a script of frames; raises `stop` once the script runs out.
struct ScriptedCamera {
    shots: VecDeque<Shot>,
    stop: Arc<AtomicBool>,
}

impl ScriptedCamera {
    fn new(shots: Vec<Shot>) -> Self {
        Self {
            shots: shots.into(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FrameSource for ScriptedCamera {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError> {
        let shot = self.shots.pop_front();
        if self.shots.is_empty() {
            self.stop.store(true, Ordering::SeqCst);
        }
        match shot {
            Some(Shot::Frame(frame)) => Ok(Some(frame)),
            Some(Shot::Nothing) | None => Ok(None),
            Some(Shot::Down) => Err(CameraError::Io {
                url: "scripted".into(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
            }),
        }
    }
}

#[derive(Clone, Default)]
struct Recorder {
    sent: Arc<Mutex<Vec<(String, Direction)>>>,
    answer: Option<NotifyOutcome>,
}

impl Recorder {
    fn sent(&self) -> Vec<(String, Direction)> {
        self.sent.lock().expect("recorder lock").clone()
    }
}

impl AdmissionNotifier for Recorder {
    fn notify(&self, plate: &str, direction: Direction) -> Result<NotifyOutcome, NotifyError> {
        self.sent
            .lock()
            .expect("recorder lock")
            .push((plate.to_string(), direction));
        Ok(self.answer.clone().unwrap_or(NotifyOutcome::Accepted))
    }
}

/// Loses the first `drops` notifications to a closed port, then accepts.
struct FlakyLink {
    attempts: Arc<Mutex<Vec<String>>>,
    drops: usize,
    dead: AdmissionClient,
}

impl FlakyLink {
    fn new(drops: usize) -> Self {
        Self {
            attempts: Arc::default(),
            drops,
            dead: AdmissionClient::new("http://127.0.0.1:1", Duration::from_millis(500)),
        }
    }
}

impl AdmissionNotifier for FlakyLink {
    fn notify(&self, plate: &str, direction: Direction) -> Result<NotifyOutcome, NotifyError> {
        let mut attempts = self.attempts.lock().expect("attempts lock");
        attempts.push(plate.to_string());
        if attempts.len() <= self.drops {
            drop(attempts);
            return self.dead.notify(plate, direction);
        }
        Ok(NotifyOutcome::Accepted)
    }
}

fn detector(reply: &'static str) -> PlateDetector {
    PlateDetector::new(DetectorParams::default(), Arc::new(FixedOcr(reply)))
}

fn config(direction: Direction) -> WatchConfig {
    WatchConfig {
        direction,
        poll_interval_ms: 1,
        ..WatchConfig::default()
    }
}

#[test]
fn read_plate_is_notified_once_per_window() {
    let camera = ScriptedCamera::new(vec![Shot::Frame(plate_frame()), Shot::Frame(plate_frame())]);
    let recorder = Recorder::default();
    let mut watcher = Watcher::new(camera, detector("1234 BCD"), recorder.clone(), config(Direction::Entry));

    let first = watcher.poll_once().expect("first pass");
    assert!(first.frame);
    assert_eq!(first.plates.len(), 1);
    assert_eq!(first.plates[0].as_str(), "1234BCD");
    assert_eq!(first.notified.len(), 1);
    assert_eq!(first.notified[0].1, NotifyOutcome::Accepted);

    let second = watcher.poll_once().expect("second pass");
    assert_eq!(second.plates.len(), 1);
    assert!(second.notified.is_empty());

    assert_eq!(recorder.sent(), vec![("1234BCD".to_string(), Direction::Entry)]);
}

#[test]
fn zero_repeat_window_notifies_every_pass() {
    let camera = ScriptedCamera::new(vec![Shot::Frame(plate_frame()), Shot::Frame(plate_frame())]);
    let recorder = Recorder {
        answer: Some(NotifyOutcome::NoOpenSession),
        ..Recorder::default()
    };
    let cfg = WatchConfig {
        repeat_window_secs: 0,
        ..config(Direction::Exit)
    };
    let mut watcher = Watcher::new(camera, detector("1234BCD"), recorder.clone(), cfg);

    watcher.poll_once().expect("first pass");
    let second = watcher.poll_once().expect("second pass");
    assert_eq!(second.notified[0].1, NotifyOutcome::NoOpenSession);
    assert_eq!(recorder.sent().len(), 2);
    assert!(recorder.sent().iter().all(|(_, d)| *d == Direction::Exit));
}

#[test]
fn short_text_is_not_notified() {
    let camera = ScriptedCamera::new(vec![Shot::Frame(plate_frame())]);
    let recorder = Recorder::default();
    let mut watcher = Watcher::new(camera, detector("AB1"), recorder.clone(), config(Direction::Entry));

    let report = watcher.poll_once().expect("pass");
    assert!(report.frame);
    assert!(report.plates.is_empty());
    assert!(recorder.sent().is_empty());
}

#[test]
fn missing_frame_and_camera_failure() {
    let camera = ScriptedCamera::new(vec![Shot::Nothing, Shot::Down]);
    let mut watcher = Watcher::new(camera, detector("1234BCD"), Recorder::default(), config(Direction::Entry));

    let empty = watcher.poll_once().expect("no frame is not an error");
    assert!(!empty.frame);
    assert!(matches!(watcher.poll_once(), Err(WatchError::Camera(_))));
}

#[test]
fn run_survives_failures_until_stopped() {
    let camera = ScriptedCamera::new(vec![
        Shot::Down,
        Shot::Nothing,
        Shot::Frame(plate_frame()),
        Shot::Nothing,
    ]);
    let stop = Arc::clone(&camera.stop);
    let recorder = Recorder::default();
    let mut watcher = Watcher::new(camera, detector("1234BCD"), recorder.clone(), config(Direction::Entry));

    let passes = watcher.run(&stop);
    assert_eq!(passes, 4);
    assert_eq!(recorder.sent().len(), 1);
}

#[test]
fn run_returns_immediately_when_already_stopped() {
    let camera = ScriptedCamera::new(vec![Shot::Frame(plate_frame())]);
    let recorder = Recorder::default();
    let mut watcher = Watcher::new(camera, detector("1234BCD"), recorder.clone(), config(Direction::Entry));
    assert_eq!(watcher.run(&AtomicBool::new(true)), 0);
    assert!(recorder.sent().is_empty());
}

#[test]
fn undelivered_plate_does_not_stop_the_frame() {
    let camera = ScriptedCamera::new(vec![
        Shot::Frame(two_plate_frame()),
        Shot::Frame(two_plate_frame()),
    ]);
    let ocr = CyclingOcr {
        replies: vec!["1111AAA", "2222BBB"],
        next: Mutex::new(0),
    };
    let detector = PlateDetector::new(DetectorParams::default(), Arc::new(ocr));
    let link = FlakyLink::new(1);
    let attempts = Arc::clone(&link.attempts);
    let mut watcher = Watcher::new(camera, detector, link, config(Direction::Entry));

    let first = watcher.poll_once().expect("failed notification is not a pass error");
    assert_eq!(first.plates.len(), 2);
    assert_eq!(first.failed.len(), 1);
    assert_eq!(first.notified.len(), 1);
    assert_ne!(first.failed[0], first.notified[0].0);
    assert_eq!(attempts.lock().expect("attempts lock").len(), 2);

    // Only the undelivered plate is sent again.
    let second = watcher.poll_once().expect("second pass");
    assert!(second.failed.is_empty());
    assert_eq!(second.notified.len(), 1);
    assert_eq!(second.notified[0].0, first.failed[0]);
    assert_eq!(attempts.lock().expect("attempts lock").len(), 3);
}
