use super::{Facility, ParkingStore, StoreError};
use crate::{Lot, ParkingLogEntry, Spot, SpotKey, VehicleRecord};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Volatile store; state lives for the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Facility>,
}

impl MemoryStore {
    pub fn new(facility: Facility) -> Self {
        Self {
            state: RwLock::new(facility),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Facility {
        self.state.read().clone()
    }
}

impl ParkingStore for MemoryStore {
    fn find_vehicle(&self, plate: &str) -> Result<Option<VehicleRecord>, StoreError> {
        Ok(self.state.read().find_vehicle(plate))
    }

    fn spot(&self, key: SpotKey) -> Result<Option<Spot>, StoreError> {
        Ok(self.state.read().spot(key))
    }

    fn first_free_spot(&self, lot: Lot) -> Result<Option<Spot>, StoreError> {
        Ok(self.state.read().first_spot_where(lot, false))
    }

    fn first_occupied_spot(&self, lot: Lot) -> Result<Option<Spot>, StoreError> {
        Ok(self.state.read().first_spot_where(lot, true))
    }

    fn claim_spot(&self, key: SpotKey, at: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self.state.write().claim_spot(key, at))
    }

    fn set_spot(
        &self,
        key: SpotKey,
        occupied: bool,
        claimed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        Ok(self.state.write().set_spot(key, occupied, claimed_at))
    }

    fn insert_log(
        &self,
        plate: &str,
        entered_at: DateTime<Utc>,
        spot: Option<SpotKey>,
    ) -> Result<ParkingLogEntry, StoreError> {
        Ok(self.state.write().insert_log(plate, entered_at, spot))
    }

    fn open_log(&self, plate: &str) -> Result<Option<ParkingLogEntry>, StoreError> {
        Ok(self.state.read().open_log(plate))
    }

    fn close_log(&self, id: u64, exited_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.state.write().close_log(id, exited_at)
    }

    fn admit(
        &self,
        plate: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ParkingLogEntry>, StoreError> {
        Ok(self.state.write().admit(plate, at))
    }

    fn discharge(
        &self,
        id: u64,
        exited_at: DateTime<Utc>,
        spot: Option<SpotKey>,
    ) -> Result<(), StoreError> {
        self.state.write().discharge(id, exited_at, spot)
    }

    fn activity_since(&self, since: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self.state.read().activity_since(since))
    }

    fn spots(&self) -> Result<Vec<Spot>, StoreError> {
        Ok(self.state.read().spots())
    }

    fn logs(&self) -> Result<Vec<ParkingLogEntry>, StoreError> {
        Ok(self.state.read().log().to_vec())
    }
}
