//! Version history lookups shared by the versioned resources.

use axum::Json;
use uuid::Uuid;
use waybill_core::models::{CreatePayload, UpdatePayload};
use waybill_core::{CrudService, Entity, HistoryRecord, Versioned};

use crate::error::{ApiError, ApiResult};
use crate::state::blocking;

fn no_history<E: Entity>(id: Uuid) -> ApiError {
    ApiError::not_found(format!("{} '{}' has no history", E::NAME, id))
}

/// Every version of an entity, oldest first.
pub(crate) async fn all<E, C, U>(
    service: CrudService<E, C, U>,
    id: Uuid,
) -> ApiResult<Json<Vec<HistoryRecord>>>
where
    E: Versioned,
    C: CreatePayload<E> + 'static,
    U: UpdatePayload<E> + 'static,
{
    let records = blocking(move || service.history(id)).await?;
    if records.is_empty() {
        return Err(no_history::<E>(id));
    }
    Ok(Json(records))
}

pub(crate) async fn latest<E, C, U>(
    service: CrudService<E, C, U>,
    id: Uuid,
) -> ApiResult<Json<HistoryRecord>>
where
    E: Versioned,
    C: CreatePayload<E> + 'static,
    U: UpdatePayload<E> + 'static,
{
    blocking(move || service.latest(id))
        .await?
        .map(Json)
        .ok_or_else(|| no_history::<E>(id))
}

pub(crate) async fn version<E, C, U>(
    service: CrudService<E, C, U>,
    id: Uuid,
    version: u32,
) -> ApiResult<Json<HistoryRecord>>
where
    E: Versioned,
    C: CreatePayload<E> + 'static,
    U: UpdatePayload<E> + 'static,
{
    blocking(move || service.at_version(id, version))
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found(format!("{} '{}' has no version {}", E::NAME, id, version))
        })
}
