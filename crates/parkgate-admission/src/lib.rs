//! Admission control for a two-lot parking facility.
//!
//! [`AdmissionController`] owns the per-plate state machine (outside / inside)
//! and the spot allocation. Every mutating operation runs under one lock so
//! that entries, exits and sensor reports never interleave. Storage sits
//! behind the [`ParkingStore`] trait; [`MemoryStore`] and [`JsonFileStore`]
//! are provided.

mod clock;
mod controller;
mod model;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    AdmissionController, AdmissionError, AdmissionPolicy, EntryGrant, ExitPolicy, ExitReceipt,
    SensorOutcome, SensorPolicy, MAX_WINDOW_SECS,
};
pub use model::{Lot, ParkingLogEntry, ParseLotError, Spot, SpotKey, VehicleRecord};
pub use store::{Facility, JsonFileStore, MemoryStore, ParkingStore, StoreError};
