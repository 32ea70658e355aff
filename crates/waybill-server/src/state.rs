//! Server state management.

use std::sync::Arc;

use waybill_core::error::WaybillResult;
use waybill_core::{Database, DeliveryService, OrderService, WaybillConfig, ZoneService};

use crate::error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub orders: OrderService,
    pub deliveries: DeliveryService,
    pub zones: ZoneService,
}

impl AppState {
    /// Create application state over an open database.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            orders: OrderService::new(db.clone()),
            deliveries: DeliveryService::new(db.clone()),
            zones: ZoneService::new(db.clone()),
            db,
        }
    }

    /// Open the database described by `config`.
    pub fn open(config: WaybillConfig) -> WaybillResult<Self> {
        Ok(Self::new(Arc::new(Database::open(config)?)))
    }

    /// State over a private in-memory database.
    pub fn in_memory() -> WaybillResult<Self> {
        Ok(Self::new(Arc::new(Database::in_memory()?)))
    }
}

/// Run blocking database work off the async executor.
pub async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> WaybillResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("Database task failed: {}", e)))?
        .map_err(ApiError::from)
}
