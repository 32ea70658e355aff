//! Delivery endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use waybill_core::{Delivery, DeliveryCreate, DeliveryUpdate, HistoryRecord, Page};

use super::history;
use crate::error::{ApiError, ApiResult};
use crate::state::{blocking, AppState};

fn delivery_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Delivery '{}' not found", id))
}

/// List deliveries.
/// GET /deliveries
pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Delivery>>> {
    let deliveries = blocking(move || state.deliveries.list(page)).await?;
    Ok(Json(deliveries))
}

/// Create a delivery.
/// POST /deliveries
pub async fn create_delivery(
    State(state): State<AppState>,
    Json(request): Json<DeliveryCreate>,
) -> ApiResult<(StatusCode, Json<Delivery>)> {
    let delivery = blocking(move || state.deliveries.create(request)).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

/// GET /deliveries/:id
pub async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Delivery>> {
    blocking(move || state.deliveries.get(id))
        .await?
        .map(Json)
        .ok_or_else(|| delivery_not_found(id))
}

/// PUT /deliveries/:id
pub async fn update_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DeliveryUpdate>,
) -> ApiResult<Json<Delivery>> {
    let delivery = blocking(move || state.deliveries.update(id, &request)).await?;
    Ok(Json(delivery))
}

/// DELETE /deliveries/:id
pub async fn delete_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Delivery>> {
    blocking(move || state.deliveries.remove(id))
        .await?
        .map(Json)
        .ok_or_else(|| delivery_not_found(id))
}

/// GET /deliveries/:id/history
pub async fn delivery_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<HistoryRecord>>> {
    history::all(state.deliveries, id).await
}

/// GET /deliveries/:id/history/latest
pub async fn delivery_latest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HistoryRecord>> {
    history::latest(state.deliveries, id).await
}

/// GET /deliveries/:id/history/:version
pub async fn delivery_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(Uuid, u32)>,
) -> ApiResult<Json<HistoryRecord>> {
    history::version(state.deliveries, id, version).await
}
