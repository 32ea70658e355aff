//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use waybill_core::Zone;

use crate::error::ApiResult;
use crate::state::{blocking, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub versioned: Vec<String>,
    pub version: String,
}

/// Health check endpoint.
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let db = state.db.clone();
    blocking(move || db.read(|uow| uow.count::<Zone>())).await?;

    let versioned = state
        .db
        .registry()
        .all()
        .iter()
        .map(|schema| schema.name().to_string())
        .collect();

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        versioned,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
