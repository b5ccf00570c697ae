use crate::store::StoreError;
use crate::{Lot, ParkingLogEntry, Spot, SpotKey, VehicleRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Complete facility state: registry, spots and log.
///
/// Also the on-disk format of [`JsonFileStore`](crate::JsonFileStore).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    #[serde(default)]
    vehicles: Vec<VehicleRecord>,
    #[serde(default)]
    spots: Vec<Spot>,
    #[serde(default)]
    log: Vec<ParkingLogEntry>,
    #[serde(skip)]
    index: Index,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Index {
    vehicles: HashMap<String, usize>,
    spots: BTreeMap<SpotKey, usize>,
}

impl Facility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add spots `1..=count` to `lot`.
    pub fn with_lot(mut self, lot: Lot, count: u32) -> Self {
        for number in 1..=count {
            self.add_spot(Spot::free(SpotKey::new(lot, number)));
        }
        self
    }

    pub fn with_spot(mut self, spot: Spot) -> Self {
        self.add_spot(spot);
        self
    }

    pub fn with_vehicle(mut self, plate: impl Into<String>, owner_id: u64) -> Self {
        self.add_vehicle(VehicleRecord {
            plate: plate.into(),
            owner_id,
        });
        self
    }

    /// Register a vehicle, replacing any record with the same plate.
    pub fn add_vehicle(&mut self, vehicle: VehicleRecord) {
        match self.index.vehicles.get(&vehicle.plate) {
            Some(&i) => self.vehicles[i] = vehicle,
            None => {
                self.index
                    .vehicles
                    .insert(vehicle.plate.clone(), self.vehicles.len());
                self.vehicles.push(vehicle);
            }
        }
    }

    /// Provision a spot, replacing any spot with the same key.
    pub fn add_spot(&mut self, spot: Spot) {
        match self.index.spots.get(&spot.key) {
            Some(&i) => self.spots[i] = spot,
            None => {
                self.index.spots.insert(spot.key, self.spots.len());
                self.spots.push(spot);
            }
        }
    }

    /// Rebuild lookup tables after deserialisation.
    pub(crate) fn reindex(&mut self) {
        self.index.vehicles = self
            .vehicles
            .iter()
            .enumerate()
            .map(|(i, v)| (v.plate.clone(), i))
            .collect();
        self.index.spots = self
            .spots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.key, i))
            .collect();
    }

    pub(crate) fn find_vehicle(&self, plate: &str) -> Option<VehicleRecord> {
        self.index
            .vehicles
            .get(plate)
            .map(|&i| self.vehicles[i].clone())
    }

    pub(crate) fn spot(&self, key: SpotKey) -> Option<Spot> {
        self.index.spots.get(&key).map(|&i| self.spots[i].clone())
    }

    fn spot_mut(&mut self, key: SpotKey) -> Option<&mut Spot> {
        let i = *self.index.spots.get(&key)?;
        self.spots.get_mut(i)
    }

    fn lot_spots(&self, lot: Lot) -> impl Iterator<Item = &Spot> {
        self.index
            .spots
            .range(SpotKey::new(lot, 0)..=SpotKey::new(lot, u32::MAX))
            .map(|(_, &i)| &self.spots[i])
    }

    pub(crate) fn first_spot_where(&self, lot: Lot, occupied: bool) -> Option<Spot> {
        self.lot_spots(lot).find(|s| s.occupied == occupied).cloned()
    }

    pub(crate) fn claim_spot(&mut self, key: SpotKey, at: DateTime<Utc>) -> bool {
        match self.spot_mut(key) {
            Some(spot) if !spot.occupied => {
                spot.occupied = true;
                spot.claimed_at = Some(at);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn set_spot(
        &mut self,
        key: SpotKey,
        occupied: bool,
        claimed_at: Option<DateTime<Utc>>,
    ) -> bool {
        match self.spot_mut(key) {
            Some(spot) => {
                spot.occupied = occupied;
                spot.claimed_at = claimed_at;
                true
            }
            None => false,
        }
    }

    pub(crate) fn insert_log(
        &mut self,
        plate: &str,
        entered_at: DateTime<Utc>,
        spot: Option<SpotKey>,
    ) -> ParkingLogEntry {
        let entry = ParkingLogEntry {
            id: self.log.last().map_or(1, |e| e.id + 1),
            plate: plate.to_string(),
            entered_at,
            exited_at: None,
            spot,
        };
        self.log.push(entry.clone());
        entry
    }

    pub(crate) fn open_log(&self, plate: &str) -> Option<ParkingLogEntry> {
        self.log
            .iter()
            .rev()
            .find(|e| e.plate == plate && e.is_open())
            .cloned()
    }

    pub(crate) fn close_log(&mut self, id: u64, exited_at: DateTime<Utc>) -> Result<(), StoreError> {
        let entry = self
            .log
            .iter_mut()
            .rev()
            .find(|e| e.id == id)
            .ok_or(StoreError::UnknownLog(id))?;
        entry.exited_at = Some(exited_at);
        Ok(())
    }

    /// Claim the first free spot in lot priority order and open a log
    /// entry for `plate` on it. `None` when every spot is taken.
    pub(crate) fn admit(&mut self, plate: &str, at: DateTime<Utc>) -> Option<ParkingLogEntry> {
        let key = Lot::PRIORITY
            .into_iter()
            .find_map(|lot| self.first_spot_where(lot, false))?
            .key;
        self.claim_spot(key, at).then(|| self.insert_log(plate, at, Some(key)))
    }

    /// Close log `id` and free `spot`. Nothing changes if the log is unknown.
    pub(crate) fn discharge(
        &mut self,
        id: u64,
        exited_at: DateTime<Utc>,
        spot: Option<SpotKey>,
    ) -> Result<(), StoreError> {
        self.close_log(id, exited_at)?;
        if let Some(key) = spot {
            self.set_spot(key, false, None);
        }
        Ok(())
    }

    pub(crate) fn activity_since(&self, since: DateTime<Utc>) -> bool {
        self.log
            .iter()
            .any(|e| e.entered_at >= since || e.exited_at.is_some_and(|t| t >= since))
    }

    pub fn spots(&self) -> Vec<Spot> {
        self.index
            .spots
            .values()
            .map(|&i| self.spots[i].clone())
            .collect()
    }

    pub fn log(&self) -> &[ParkingLogEntry] {
        &self.log
    }

    pub fn vehicles(&self) -> &[VehicleRecord] {
        &self.vehicles
    }
}
