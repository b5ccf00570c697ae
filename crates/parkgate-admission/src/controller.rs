use crate::clock::{Clock, SystemClock};
use crate::store::{ParkingStore, StoreError};
use crate::{Lot, Spot, SpotKey};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum AdmissionError {
    #[error("plate {0} is not registered")]
    UnregisteredPlate(String),
    #[error("no free spot in any lot")]
    FacilityFull,
    #[error("plate {0} is already inside")]
    AlreadyInside(String),
    #[error("plate {0} has no open visit")]
    NoOpenSession(String),
    #[error("unknown spot {0}")]
    UnknownSpot(SpotKey),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdmissionError {
    /// HTTP status used by the admission API.
    pub fn status_code(&self) -> u16 {
        match self {
            AdmissionError::UnregisteredPlate(_) => 403,
            AdmissionError::FacilityFull | AdmissionError::AlreadyInside(_) => 409,
            AdmissionError::NoOpenSession(_) | AdmissionError::UnknownSpot(_) => 404,
            AdmissionError::Store(_) => 500,
        }
    }
}

/// Which occupied spot an exit frees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// The spot recorded at entry, falling back to lot priority if it is
    /// unknown or already free.
    #[default]
    AssignedSpot,
    /// First occupied spot in lot priority order.
    LotPriority,
}

/// Longest claim grace or change window a configuration may ask for
/// (about a century).
pub const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorPolicy {
    /// How long an unconfirmed admission claim outranks a "free" report.
    pub claim_grace_secs: u64,
}

impl Default for SensorPolicy {
    fn default() -> Self {
        Self {
            claim_grace_secs: 120,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionPolicy {
    pub exit: ExitPolicy,
    pub sensor: SensorPolicy,
    /// Look-back window of the change poll.
    pub change_window_secs: u64,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            exit: ExitPolicy::AssignedSpot,
            sensor: SensorPolicy::default(),
            change_window_secs: 60,
        }
    }
}

/// A successful entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryGrant {
    pub log_id: u64,
    pub plate: String,
    pub spot: SpotKey,
    pub entered_at: DateTime<Utc>,
}

/// A successful exit. `freed` is `None` when no spot was occupied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExitReceipt {
    pub log_id: u64,
    pub plate: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: DateTime<Utc>,
    pub freed: Option<SpotKey>,
}

/// Effect of a sensor report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorOutcome {
    /// The occupied flag changed.
    Applied,
    /// The spot already had the reported state.
    Unchanged,
    /// A "free" report contradicted a recent admission claim.
    Ignored,
}

/// Serializes entries, exits and sensor reports over a [`ParkingStore`].
pub struct AdmissionController {
    store: Box<dyn ParkingStore>,
    clock: Arc<dyn Clock>,
    policy: AdmissionPolicy,
    lock: Mutex<()>,
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AdmissionController {
    pub fn new(store: Box<dyn ParkingStore>, policy: AdmissionPolicy) -> Self {
        Self::with_clock(store, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Box<dyn ParkingStore>,
        policy: AdmissionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn store(&self) -> &dyn ParkingStore {
        self.store.as_ref()
    }

    /// Admit `plate` into the first free spot, inferior lot first.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn entry(&self, plate: &str) -> Result<EntryGrant, AdmissionError> {
        let _guard = self.lock.lock();
        let now = self.clock.now();

        if self.store.find_vehicle(plate)?.is_none() {
            return Err(AdmissionError::UnregisteredPlate(plate.to_string()));
        }
        if self.store.open_log(plate)?.is_some() {
            return Err(AdmissionError::AlreadyInside(plate.to_string()));
        }

        let Some(entry) = self.store.admit(plate, now)? else {
            info!("entry of {plate} refused: facility full");
            return Err(AdmissionError::FacilityFull);
        };
        let spot = entry.spot.ok_or_else(|| {
            StoreError::Unavailable(format!("log {} was opened without a spot", entry.id))
        })?;
        info!("entry of {plate} into {spot} (log {})", entry.id);
        Ok(EntryGrant {
            log_id: entry.id,
            plate: entry.plate,
            spot,
            entered_at: entry.entered_at,
        })
    }

    /// Close the open visit of `plate` and free one occupied spot.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn exit(&self, plate: &str) -> Result<ExitReceipt, AdmissionError> {
        let _guard = self.lock.lock();
        let now = self.clock.now();

        if self.store.find_vehicle(plate)?.is_none() {
            return Err(AdmissionError::UnregisteredPlate(plate.to_string()));
        }
        let Some(entry) = self.store.open_log(plate)? else {
            return Err(AdmissionError::NoOpenSession(plate.to_string()));
        };
        let exited_at = now.max(entry.entered_at);

        let freed = self.spot_to_free(entry.spot)?;
        self.store.discharge(entry.id, exited_at, freed)?;

        match freed {
            Some(key) => info!("exit of {plate}, freed {key}"),
            None => warn!("exit of {plate} found no occupied spot to free"),
        }
        Ok(ExitReceipt {
            log_id: entry.id,
            plate: entry.plate,
            entered_at: entry.entered_at,
            exited_at,
            freed,
        })
    }

    fn spot_to_free(&self, assigned: Option<SpotKey>) -> Result<Option<SpotKey>, StoreError> {
        if self.policy.exit == ExitPolicy::AssignedSpot {
            if let Some(key) = assigned {
                match self.store.spot(key)? {
                    Some(spot) if spot.occupied => return Ok(Some(key)),
                    _ => debug!("assigned spot {key} is not occupied, using lot priority"),
                }
            }
        }
        for lot in Lot::PRIORITY {
            if let Some(spot) = self.store.first_occupied_spot(lot)? {
                return Ok(Some(spot.key));
            }
        }
        Ok(None)
    }

    /// Apply a per-spot occupancy report from a sensor.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn report_sensor(
        &self,
        key: SpotKey,
        occupied: bool,
    ) -> Result<SensorOutcome, AdmissionError> {
        let _guard = self.lock.lock();
        let now = self.clock.now();

        let spot = self
            .store
            .spot(key)?
            .ok_or(AdmissionError::UnknownSpot(key))?;

        if occupied {
            if spot.occupied && spot.claimed_at.is_none() {
                return Ok(SensorOutcome::Unchanged);
            }
            self.store.set_spot(key, true, None)?;
            return Ok(if spot.occupied {
                debug!("sensor confirmed claim on {key}");
                SensorOutcome::Unchanged
            } else {
                SensorOutcome::Applied
            });
        }

        if !spot.occupied {
            return Ok(SensorOutcome::Unchanged);
        }
        if let Some(claimed_at) = spot.claimed_at {
            let within_grace = window(self.policy.sensor.claim_grace_secs)
                .map_or(true, |grace| now - claimed_at < grace);
            if within_grace {
                debug!("ignoring free report for {key}, claimed at {claimed_at}");
                return Ok(SensorOutcome::Ignored);
            }
        }
        self.store.set_spot(key, false, None)?;
        Ok(SensorOutcome::Applied)
    }

    /// True if any visit started or ended within the change window.
    pub fn has_recent_activity(&self) -> Result<bool, AdmissionError> {
        self.activity_within(window(self.policy.change_window_secs))
    }

    pub fn has_activity_within(&self, window: Duration) -> Result<bool, AdmissionError> {
        self.activity_within(Some(window))
    }

    /// Windows reaching past the earliest representable time cover the whole log.
    fn activity_within(&self, window: Option<Duration>) -> Result<bool, AdmissionError> {
        let since = window
            .and_then(|w| self.clock.now().checked_sub_signed(w))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self.store.activity_since(since)?)
    }

    /// Every spot with its current state.
    pub fn occupancy(&self) -> Result<Vec<Spot>, AdmissionError> {
        Ok(self.store.spots()?)
    }
}

/// `None` when `secs` does not fit a [`Duration`].
fn window(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}
