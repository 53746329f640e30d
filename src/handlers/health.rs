//! Liveness and upstream connectivity checks

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

use crate::models::gis::ServiceStatusResponse;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn root() -> &'static str {
    "Meter tracker backend"
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn status_response(
    service: &str,
    result: Result<(), String>,
) -> Result<Json<ServiceStatusResponse>, (StatusCode, Json<ServiceStatusResponse>)> {
    match result {
        Ok(()) => Ok(Json(ServiceStatusResponse {
            service: service.to_string(),
            available: true,
            error: None,
        })),
        Err(e) => {
            warn!(service = %service, error = %e, "Upstream service unavailable");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ServiceStatusResponse {
                    service: service.to_string(),
                    available: false,
                    error: Some(e),
                }),
            ))
        }
    }
}

/// GET /api/gis/status
pub async fn gis_status(
    State(state): State<AppState>,
) -> Result<Json<ServiceStatusResponse>, (StatusCode, Json<ServiceStatusResponse>)> {
    status_response("gis", state.gis.check_connection().await.map_err(|e| e.to_string()))
}

/// GET /api/pdf/status
pub async fn pdf_status(
    State(state): State<AppState>,
) -> Result<Json<ServiceStatusResponse>, (StatusCode, Json<ServiceStatusResponse>)> {
    status_response("pdf", state.pdf.check_status().await.map_err(|e| e.to_string()))
}
