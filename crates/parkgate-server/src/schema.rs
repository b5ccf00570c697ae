//! Request and response bodies of the admission API.

use parkgate_admission::{Lot, Spot};
use serde::{Deserialize, Serialize};

/// Body of `/api/entrada` and `/api/salida`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PlateRequest {
    pub matricula: String,
}

/// Body of `/api/actualizarplaza`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SpotReport {
    #[serde(rename = "sensorID")]
    pub sensor_id: String,
    #[serde(rename = "plazaID")]
    pub spot: u32,
    pub estado: Occupancy,
}

/// Sensor occupancy flag.
///
/// Accepts `true`/`false`, `1`/`0` and the strings `"ocupado"`/`"libre"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawOccupancy")]
pub struct Occupancy(pub bool);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOccupancy {
    Flag(bool),
    Number(i64),
    Word(String),
}

impl TryFrom<RawOccupancy> for Occupancy {
    type Error = String;

    fn try_from(raw: RawOccupancy) -> Result<Self, Self::Error> {
        match raw {
            RawOccupancy::Flag(b) => Ok(Occupancy(b)),
            RawOccupancy::Number(1) => Ok(Occupancy(true)),
            RawOccupancy::Number(0) => Ok(Occupancy(false)),
            RawOccupancy::Word(w) if w.eq_ignore_ascii_case("ocupado") => Ok(Occupancy(true)),
            RawOccupancy::Word(w) if w.eq_ignore_ascii_case("libre") => Ok(Occupancy(false)),
            RawOccupancy::Number(n) => Err(format!("invalid estado {n}, expected 0 or 1")),
            RawOccupancy::Word(w) => Err(format!("invalid estado {w:?}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpotView {
    pub lot: Lot,
    pub number: u32,
    pub occupied: bool,
}

impl From<&Spot> for SpotView {
    fn from(spot: &Spot) -> Self {
        Self {
            lot: spot.key.lot,
            number: spot.key.number,
            occupied: spot.occupied,
        }
    }
}
