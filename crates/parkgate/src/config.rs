//! TOML configuration of the `parkgate` binary.
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::camera::CameraConfig;
use crate::watch::WatchConfig;
use log::LevelFilter;
use parkgate_admission::{
    AdmissionPolicy, Facility, JsonFileStore, Lot, MemoryStore, ParkingStore, StoreError,
    VehicleRecord, MAX_WINDOW_SECS,
};
use parkgate_plate::{
    DetectorParams, LocalizerParams, ReaderParams, RectifierParams, TesseractCli,
};
use parkgate_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
    #[error(transparent)]
    Syntax(#[from] toml::de::Error),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("unknown log level `{0}`")]
    LogLevel(String),
}

/// Upper bound of every millisecond interval and timeout (one day).
const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkgateConfig {
    pub camera: CameraConfig,
    pub localizer: LocalizerParams,
    pub rectifier: RectifierParams,
    pub reader: ReaderParams,
    pub ocr: OcrConfig,
    pub watch: WatchConfig,
    pub admission: AdmissionPolicy,
    pub server: ServerConfig,
    pub facility: FacilityConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// `tesseract` executable, looked up on `PATH` when relative.
    pub program: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tesseract"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityConfig {
    /// Spots provisioned in the inferior lot, numbered from 1.
    pub inferior: u32,
    pub superior: u32,
    pub store: StoreKind,
    /// State file of the `json` store. Seeded from this section when missing.
    pub path: PathBuf,
    pub vehicles: Vec<VehicleRecord>,
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            inferior: 10,
            superior: 10,
            store: StoreKind::Memory,
            path: PathBuf::from("parkgate-state.json"),
            vehicles: Vec::new(),
        }
    }
}

impl FacilityConfig {
    /// Spots and registry described by this section, with an empty log.
    pub fn seed(&self) -> Facility {
        let mut facility = Facility::new()
            .with_lot(Lot::Inferior, self.inferior)
            .with_lot(Lot::Superior, self.superior);
        for vehicle in &self.vehicles {
            facility.add_vehicle(vehicle.clone());
        }
        facility
    }

    pub fn open_store(&self) -> Result<Box<dyn ParkingStore>, StoreError> {
        Ok(match self.store {
            StoreKind::Memory => Box::new(MemoryStore::new(self.seed())),
            StoreKind::Json => Box::new(JsonFileStore::open(&self.path, self.seed())?),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    /// JSON lines instead of text (only with the `tracing` feature).
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.level).map_err(|_| ConfigError::LogLevel(self.level.clone()))
    }
}

impl ParkgateConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the detector, the loops or the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        let (low, high) = (self.localizer.canny_low, self.localizer.canny_high);
        if !(low.is_finite() && low >= 0.0) {
            return invalid("localizer.canny_low", "must be a finite, non-negative number");
        }
        if !high.is_finite() || high < low {
            return invalid("localizer.canny_high", "must be finite and at least canny_low");
        }

        let windows = [
            ("admission.sensor.claim_grace_secs", self.admission.sensor.claim_grace_secs),
            ("admission.change_window_secs", self.admission.change_window_secs),
        ];
        for (field, secs) in windows {
            if secs > MAX_WINDOW_SECS {
                return invalid(field, &format!("must not exceed {MAX_WINDOW_SECS} s"));
            }
        }

        let intervals = [
            ("camera.timeout_ms", self.camera.timeout_ms),
            ("watch.poll_interval_ms", self.watch.poll_interval_ms),
            ("watch.notify_timeout_ms", self.watch.notify_timeout_ms),
            ("server.poll_interval_ms", self.server.poll_interval_ms),
        ];
        for (field, ms) in intervals {
            if ms > MAX_INTERVAL_MS {
                return invalid(field, &format!("must not exceed {MAX_INTERVAL_MS} ms"));
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = self.to_toml()?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        fs::write(path, text).map_err(write_err)
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            localizer: self.localizer.clone(),
            rectifier: self.rectifier.clone(),
            reader: self.reader.clone(),
        }
    }

    pub fn ocr_engine(&self) -> TesseractCli {
        TesseractCli::new(&self.ocr.program)
    }
}
