//! Plate-recognition gate for a two-lot parking facility.
//!
//! This crate ties the workspace together:
//! - re-exports of the pipeline crates (`core`, `plate`, `admission`, `server`),
//! - [`config::ParkgateConfig`], the TOML configuration of the binary,
//! - [`camera::HttpCamera`], a snapshot-camera [`camera::FrameSource`],
//! - [`notify::AdmissionClient`], which posts read plates to the admission API,
//! - [`watch::Watcher`], the poll loop joining the two.
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use parkgate::camera::HttpCamera;
//! use parkgate::config::ParkgateConfig;
//! use parkgate::notify::AdmissionClient;
//! use parkgate::plate::PlateDetector;
//! use parkgate::watch::Watcher;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ParkgateConfig::load("parkgate.toml")?;
//! let detector = PlateDetector::new(cfg.detector_params(), Arc::new(cfg.ocr_engine()));
//! let client = AdmissionClient::new(&cfg.watch.admission_url, Duration::from_secs(5));
//! let mut watcher = Watcher::new(HttpCamera::from_config(&cfg.camera), detector, client, cfg.watch);
//! watcher.run(&AtomicBool::new(false));
//! # Ok(())
//! # }
//! ```

pub use parkgate_admission as admission;
pub use parkgate_core as core;
pub use parkgate_plate as plate;
pub use parkgate_server as server;

pub use parkgate_admission::{AdmissionController, AdmissionError, AdmissionPolicy, Lot, SpotKey};
pub use parkgate_plate::{DetectorParams, PlateDetector, PlateRead, PlateText};

pub mod camera;
pub mod config;
pub mod notify;
pub mod watch;

pub use config::{ConfigError, ParkgateConfig};
