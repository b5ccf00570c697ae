use super::{Facility, ParkingStore, StoreError};
use crate::{Lot, ParkingLogEntry, Spot, SpotKey, VehicleRecord};
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Store that rewrites a JSON snapshot after every mutation.
///
/// The snapshot is written to a sibling temp file and renamed over the
/// target. A failed write leaves both the file and the in-memory state as
/// they were before the call.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: RwLock<Facility>,
}

impl JsonFileStore {
    /// Load `path`, or create it from `seed` if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>, seed: Facility) -> Result<Self, StoreError> {
        let path = path.into();
        let facility = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let mut facility: Facility = serde_json::from_reader(reader)?;
            facility.reindex();
            debug!(
                "loaded {} spots and {} log entries from {}",
                facility.spots().len(),
                facility.log().len(),
                path.display()
            );
            facility
        } else {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            write_snapshot(&path, &seed)?;
            seed
        };
        Ok(Self {
            path,
            state: RwLock::new(facility),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Facility {
        self.state.read().clone()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Facility) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let mut state = self.state.write();
        let mut next = state.clone();
        let out = f(&mut next)?;
        write_snapshot(&self.path, &next)?;
        *state = next;
        Ok(out)
    }
}

fn write_snapshot(path: &Path, facility: &Facility) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, facility)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

impl ParkingStore for JsonFileStore {
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
        if self.state.read().spot(key).map_or(true, |s| s.occupied) {
            return Ok(false);
        }
        self.mutate(|f| Ok(f.claim_spot(key, at)))
    }

    fn set_spot(
        &self,
        key: SpotKey,
        occupied: bool,
        claimed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        if self.state.read().spot(key).is_none() {
            return Ok(false);
        }
        self.mutate(|f| Ok(f.set_spot(key, occupied, claimed_at)))
    }

    fn insert_log(
        &self,
        plate: &str,
        entered_at: DateTime<Utc>,
        spot: Option<SpotKey>,
    ) -> Result<ParkingLogEntry, StoreError> {
        self.mutate(|f| Ok(f.insert_log(plate, entered_at, spot)))
    }

    fn open_log(&self, plate: &str) -> Result<Option<ParkingLogEntry>, StoreError> {
        Ok(self.state.read().open_log(plate))
    }

    fn close_log(&self, id: u64, exited_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.mutate(|f| f.close_log(id, exited_at))
    }

    fn admit(
        &self,
        plate: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ParkingLogEntry>, StoreError> {
        let full = {
            let state = self.state.read();
            Lot::PRIORITY
                .into_iter()
                .all(|lot| state.first_spot_where(lot, false).is_none())
        };
        if full {
            return Ok(None);
        }
        self.mutate(|f| Ok(f.admit(plate, at)))
    }

    fn discharge(
        &self,
        id: u64,
        exited_at: DateTime<Utc>,
        spot: Option<SpotKey>,
    ) -> Result<(), StoreError> {
        self.mutate(|f| f.discharge(id, exited_at, spot))
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
