use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two physically separate parking areas.
///
/// Declaration order is allocation priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lot {
    Inferior,
    Superior,
}

impl Lot {
    /// Lots in the order entries are allocated.
    pub const PRIORITY: [Lot; 2] = [Lot::Inferior, Lot::Superior];

    pub fn as_str(self) -> &'static str {
        match self {
            Lot::Inferior => "inferior",
            Lot::Superior => "superior",
        }
    }

    /// Map the sensor board identifier (`"PI"`, `"PS"`) to its lot.
    pub fn from_sensor_id(id: &str) -> Option<Self> {
        match id {
            "PI" => Some(Lot::Inferior),
            "PS" => Some(Lot::Superior),
            _ => None,
        }
    }

    pub fn sensor_id(self) -> &'static str {
        match self {
            Lot::Inferior => "PI",
            Lot::Superior => "PS",
        }
    }
}

impl fmt::Display for Lot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown lot `{0}`")]
pub struct ParseLotError(pub String);

impl FromStr for Lot {
    type Err = ParseLotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inferior" => Ok(Lot::Inferior),
            "superior" => Ok(Lot::Superior),
            other => Err(ParseLotError(other.to_string())),
        }
    }
}

/// A spot address: lot plus the spot number within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpotKey {
    pub lot: Lot,
    pub number: u32,
}

impl SpotKey {
    pub fn new(lot: Lot, number: u32) -> Self {
        Self { lot, number }
    }
}

impl fmt::Display for SpotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.lot, self.number)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spot {
    pub key: SpotKey,
    pub occupied: bool,
    /// Set when an admission claimed the spot and no sensor has confirmed it yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Spot {
    pub fn free(key: SpotKey) -> Self {
        Self {
            key,
            occupied: false,
            claimed_at: None,
        }
    }
}

/// A plate allowed to enter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub plate: String,
    pub owner_id: u64,
}

/// One visit. `exited_at` is `None` while the vehicle is inside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingLogEntry {
    pub id: u64,
    pub plate: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    /// Spot assigned at entry.
    #[serde(default)]
    pub spot: Option<SpotKey>,
}

impl ParkingLogEntry {
    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }
}
