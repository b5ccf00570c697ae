//! HTTP API over the admission controller.
//!
//! | Route | Method | Body |
//! |---|---|---|
//! | `/api/entrada` | POST | `{"matricula": "..."}` |
//! | `/api/salida` | POST | `{"matricula": "..."}` |
//! | `/api/actualizarplaza` | POST | `{"sensorID": "PS"/"PI", "plazaID": n, "estado": ...}` |
//! | `/parking_log` | POST | none, answers `{"cambio": bool}` |
//! | `/api/plazas` | GET | none, answers the occupancy snapshot |
//!
//! [`handle`] is the transport-free dispatcher; [`AdmissionServer`] runs it
//! on a pool of `tiny_http` worker threads.

mod router;
mod schema;
mod server;

pub use router::{handle, ApiResponse};
pub use schema::{Occupancy, PlateRequest, SpotReport, SpotView};
pub use server::{AdmissionServer, ServerConfig, ServerError};
