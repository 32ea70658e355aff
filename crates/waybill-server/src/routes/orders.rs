//! Order endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use waybill_core::{
    DeliveryPlacement, DeliveryUpdate, HistoryRecord, Order, OrderCreate, OrderDetails,
    OrderUpdate, OrderWithDeliveryCreate, Page,
};

use super::history;
use crate::error::{ApiError, ApiResult};
use crate::state::{blocking, AppState};

/// Request body for creating an order, optionally with its delivery.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(flatten)]
    pub order: OrderCreate,
    #[serde(default)]
    pub delivery: Option<DeliveryPlacement>,
}

/// New placement of an order's delivery.
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryChanges {
    pub zone_id: Option<Uuid>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

/// Request body for updating an order, optionally moving its delivery.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(flatten)]
    pub order: OrderUpdate,
    #[serde(default)]
    pub delivery: Option<DeliveryChanges>,
}

fn order_not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Order '{}' not found", id))
}

/// List orders.
/// GET /orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<Order>>> {
    let orders = blocking(move || state.orders.list(page)).await?;
    Ok(Json(orders))
}

/// Create an order.
/// POST /orders
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderDetails>)> {
    let details = blocking(move || match request.delivery {
        Some(delivery) => state.orders.create_with_delivery(OrderWithDeliveryCreate {
            order: request.order,
            delivery,
        }),
        None => state.orders.create(request.order).map(|order| OrderDetails {
            order,
            delivery: None,
        }),
    })
    .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

/// Get an order with its delivery.
/// GET /orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderDetails>> {
    blocking(move || state.orders.details(id))
        .await?
        .map(Json)
        .ok_or_else(|| order_not_found(id))
}

/// Update an order.
/// PUT /orders/:id
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderRequest>,
) -> ApiResult<Json<OrderDetails>> {
    let details = blocking(move || match request.delivery {
        Some(changes) => {
            let delivery = DeliveryUpdate {
                zone_id: changes.zone_id,
                longitude: changes.longitude,
                latitude: changes.latitude,
                updated_by: request.order.updated_by.clone(),
            };
            state
                .orders
                .update_with_delivery(id, &request.order, &delivery)
                .map(Some)
        }
        None => {
            state.orders.update(id, &request.order)?;
            state.orders.details(id)
        }
    })
    .await?;

    details.map(Json).ok_or_else(|| order_not_found(id))
}

/// Delete an order and its delivery.
/// DELETE /orders/:id
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    blocking(move || state.orders.remove(id))
        .await?
        .map(Json)
        .ok_or_else(|| order_not_found(id))
}

/// GET /orders/:id/history
pub async fn order_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<HistoryRecord>>> {
    history::all(state.orders.orders().clone(), id).await
}

/// GET /orders/:id/history/latest
pub async fn order_latest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HistoryRecord>> {
    history::latest(state.orders.orders().clone(), id).await
}

/// GET /orders/:id/history/:version
pub async fn order_version(
    State(state): State<AppState>,
    Path((id, version)): Path<(Uuid, u32)>,
) -> ApiResult<Json<HistoryRecord>> {
    history::version(state.orders.orders().clone(), id, version).await
}
