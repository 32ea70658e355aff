//! Zone endpoints. Zones keep no history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use waybill_core::{Page, Zone, ZoneCreate, ZoneUpdate};

use crate::error::{ApiError, ApiResult};
use crate::state::{blocking, AppState};

fn zone_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Zone '{}' not found", id))
}

/// List zones.
/// GET /zones
pub async fn list_zones(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Zone>>> {
    let zones = blocking(move || state.zones.list(page)).await?;
    Ok(Json(zones))
}

/// POST /zones
pub async fn create_zone(
    State(state): State<AppState>,
    Json(request): Json<ZoneCreate>,
) -> ApiResult<(StatusCode, Json<Zone>)> {
    let zone = blocking(move || state.zones.create(request)).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// GET /zones/:id
pub async fn get_zone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Zone>> {
    blocking(move || state.zones.get(id))
        .await?
        .map(Json)
        .ok_or_else(|| zone_not_found(id))
}

/// PUT /zones/:id
pub async fn update_zone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ZoneUpdate>,
) -> ApiResult<Json<Zone>> {
    let zone = blocking(move || state.zones.update(id, &request)).await?;
    Ok(Json(zone))
}

/// DELETE /zones/:id
pub async fn delete_zone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Zone>> {
    blocking(move || state.zones.remove(id))
        .await?
        .map(Json)
        .ok_or_else(|| zone_not_found(id))
}
