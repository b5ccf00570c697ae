//! Persistence contract and the two bundled implementations.

mod facility;
mod file;
mod memory;

pub use facility::Facility;
pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::{Lot, ParkingLogEntry, Spot, SpotKey, VehicleRecord};
use chrono::{DateTime, Utc};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unknown log entry {0}")]
    UnknownLog(u64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Narrow storage interface used by the admission controller.
///
/// Implementations synchronize internally and each call is atomic on its
/// own. Entries and exits go through [`admit`](ParkingStore::admit) and
/// [`discharge`](ParkingStore::discharge), which change a spot and the log
/// in one commit.
pub trait ParkingStore: Send + Sync {
    fn find_vehicle(&self, plate: &str) -> Result<Option<VehicleRecord>, StoreError>;

    fn spot(&self, key: SpotKey) -> Result<Option<Spot>, StoreError>;

    /// Lowest-numbered free spot of `lot`.
    fn first_free_spot(&self, lot: Lot) -> Result<Option<Spot>, StoreError>;

    /// Lowest-numbered occupied spot of `lot`.
    fn first_occupied_spot(&self, lot: Lot) -> Result<Option<Spot>, StoreError>;

    /// Mark a free spot occupied and remember the claim time.
    ///
    /// Returns `false` (and changes nothing) if the spot is unknown or
    /// already occupied.
    fn claim_spot(&self, key: SpotKey, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Overwrite a spot's state. Returns `false` if the spot is unknown.
    fn set_spot(
        &self,
        key: SpotKey,
        occupied: bool,
        claimed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    /// Append an open log entry.
    fn insert_log(
        &self,
        plate: &str,
        entered_at: DateTime<Utc>,
        spot: Option<SpotKey>,
    ) -> Result<ParkingLogEntry, StoreError>;

    /// The entry for `plate` with no exit time, if any.
    fn open_log(&self, plate: &str) -> Result<Option<ParkingLogEntry>, StoreError>;

    fn close_log(&self, id: u64, exited_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Claim the first free spot in lot priority order and open a log entry
    /// for `plate` on it. Returns `None` (and changes nothing) when every
    /// spot is occupied. On error neither the spot nor the log changes.
    fn admit(&self, plate: &str, at: DateTime<Utc>)
        -> Result<Option<ParkingLogEntry>, StoreError>;

    /// Close log `id` and free `spot`. On error neither changes.
    fn discharge(
        &self,
        id: u64,
        exited_at: DateTime<Utc>,
        spot: Option<SpotKey>,
    ) -> Result<(), StoreError>;

    /// True if any entry was opened or closed at or after `since`.
    fn activity_since(&self, since: DateTime<Utc>) -> Result<bool, StoreError>;

    /// All spots, ordered by lot priority then number.
    fn spots(&self) -> Result<Vec<Spot>, StoreError>;

    /// All log entries, oldest first.
    fn logs(&self) -> Result<Vec<ParkingLogEntry>, StoreError>;
}
