//! Unit-of-work lookups across every versioned type.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use waybill_core::HistoryRecord;

use crate::error::{ApiError, ApiResult};
use crate::state::{blocking, AppState};

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction_id: i64,
    pub changes: Vec<HistoryRecord>,
}

/// Every snapshot captured by one unit of work.
/// GET /transactions/:id
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<i64>,
) -> ApiResult<Json<TransactionResponse>> {
    let changes = blocking(move || state.db.transaction_changes(transaction_id)).await?;
    if changes.is_empty() {
        return Err(ApiError::not_found(format!(
            "Transaction {} changed nothing",
            transaction_id
        )));
    }

    Ok(Json(TransactionResponse {
        transaction_id,
        changes,
    }))
}
