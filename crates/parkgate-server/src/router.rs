use crate::schema::{PlateRequest, SpotReport, SpotView};
use log::error;
use parkgate_admission::{AdmissionController, AdmissionError, Lot, SpotKey};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tiny_http::Method;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Status and JSON body of one API call.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

impl From<AdmissionError> for ApiResponse {
    fn from(err: AdmissionError) -> Self {
        if let AdmissionError::Store(store) = &err {
            error!("store failure: {store}");
        }
        let message = match &err {
            AdmissionError::UnregisteredPlate(_) => "matricula no registrada".to_string(),
            AdmissionError::FacilityFull => "parking completo".to_string(),
            AdmissionError::Store(_) => "internal storage error".to_string(),
            other => other.to_string(),
        };
        ApiResponse::error(err.status_code(), message)
    }
}

/// Dispatch one request. `path` may carry a query string, which is ignored.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(controller, body), fields(len = body.len()))
)]
pub fn handle(
    controller: &AdmissionController,
    method: &Method,
    path: &str,
    body: &[u8],
) -> ApiResponse {
    let path = path.split('?').next().unwrap_or_default();
    let allowed = match path {
        "/api/entrada" | "/api/salida" | "/api/actualizarplaza" | "/parking_log" => Method::Post,
        "/api/plazas" => Method::Get,
        _ => return ApiResponse::error(404, format!("no route for {path}")),
    };
    if *method != allowed {
        return ApiResponse::error(405, format!("{path} only accepts {allowed}"));
    }

    let result = match path {
        "/api/entrada" => entrada(controller, body),
        "/api/salida" => salida(controller, body),
        "/api/actualizarplaza" => actualizar_plaza(controller, body),
        "/parking_log" => change_poll(controller),
        _ => plazas(controller),
    };
    result.unwrap_or_else(|resp| resp)
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiResponse> {
    serde_json::from_slice(body).map_err(|e| ApiResponse::error(400, format!("malformed request: {e}")))
}

fn plate(body: &[u8]) -> Result<String, ApiResponse> {
    let req: PlateRequest = parse(body)?;
    let plate = req.matricula.trim();
    if plate.is_empty() {
        return Err(ApiResponse::error(400, "matricula must not be empty"));
    }
    Ok(plate.to_string())
}

fn entrada(controller: &AdmissionController, body: &[u8]) -> Result<ApiResponse, ApiResponse> {
    let plate = plate(body)?;
    let grant = controller.entry(&plate)?;
    Ok(ApiResponse::ok(json!({
        "success": "entrada registrada",
        "log_id": grant.log_id,
        "plaza": grant.spot,
        "entrada": grant.entered_at,
    })))
}

fn salida(controller: &AdmissionController, body: &[u8]) -> Result<ApiResponse, ApiResponse> {
    let plate = plate(body)?;
    let receipt = controller.exit(&plate)?;
    Ok(ApiResponse::ok(json!({
        "success": "salida registrada",
        "log_id": receipt.log_id,
        "plaza": receipt.freed,
        "entrada": receipt.entered_at,
        "salida": receipt.exited_at,
    })))
}

fn actualizar_plaza(
    controller: &AdmissionController,
    body: &[u8],
) -> Result<ApiResponse, ApiResponse> {
    let report: SpotReport = parse(body)?;
    let lot = Lot::from_sensor_id(&report.sensor_id).ok_or_else(|| {
        ApiResponse::error(400, format!("invalid sensorID {:?}", report.sensor_id))
    })?;
    let outcome = controller.report_sensor(SpotKey::new(lot, report.spot), report.estado.0)?;
    Ok(ApiResponse::ok(json!({
        "success": "plaza actualizada",
        "resultado": outcome,
    })))
}

fn change_poll(controller: &AdmissionController) -> Result<ApiResponse, ApiResponse> {
    let cambio = controller.has_recent_activity()?;
    Ok(ApiResponse::ok(json!({ "cambio": cambio })))
}

fn plazas(controller: &AdmissionController) -> Result<ApiResponse, ApiResponse> {
    let spots: Vec<SpotView> = controller.occupancy()?.iter().map(SpotView::from).collect();
    let free = spots.iter().filter(|s| !s.occupied).count();
    Ok(ApiResponse::ok(json!({ "plazas": spots, "libres": free })))
}
