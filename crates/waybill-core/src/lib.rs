//! waybill-core - Versioned storage for the waybill logistics backend.
//!
//! Orders, deliveries and zones live in SQLite tables. Every change to a
//! versioned entity is captured as an immutable history record, sharing one
//! transaction id with the rest of its unit of work.
//!
//! # Example
//!
//! ```ignore
//! use waybill_core::{Database, OrderService, WaybillConfig};
//!
//! let db = Arc::new(Database::open(WaybillConfig::from_env())?);
//! let orders = OrderService::new(db.clone());
//!
//! let order = orders.create(payload)?;
//! let history = orders.orders().history(order.id)?;
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod models;
pub mod service;
pub mod uow;
pub mod versioning;

// Re-export commonly used types
pub use config::{RetryPolicy, SequenceKind, WaybillConfig};
pub use entity::{ColumnType, Entity, EntitySchema, Metadata, Row, Versioned};
pub use error::{ErrorCode, WaybillError, WaybillResult};
pub use models::{
    Delivery, DeliveryCreate, DeliveryUpdate, Order, OrderCreate, OrderStatus, OrderUpdate, Zone,
    ZoneCreate, ZoneUpdate,
};
pub use service::{
    CrudService, DeliveryPlacement, DeliveryService, OrderDetails, OrderService,
    OrderWithDeliveryCreate, Page, References, ZoneService,
};
pub use uow::{Database, DatabaseBuilder, FlushContext, FlushHook, UnitOfWork};
pub use versioning::{
    HistoryRecord, HistoryStore, HistorySummary, Operation, SchemaRegistry, SqliteHistoryStore,
    VersioningInterceptor,
};
