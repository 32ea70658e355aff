//! Logistics domain entities and their request payloads.

mod delivery;
mod order;
mod zone;

pub use delivery::{Delivery, DeliveryCreate, DeliveryUpdate};
pub use order::{Order, OrderCreate, OrderStatus, OrderUpdate};
pub use zone::{Zone, ZoneCreate, ZoneUpdate};

use crate::config::WaybillConfig;
use crate::entity::Entity;
use crate::error::{WaybillError, WaybillResult};
use crate::uow::Database;

/// Input that creates a new entity.
pub trait CreatePayload<E: Entity> {
    /// Check the payload before anything is written.
    fn validate(&self) -> WaybillResult<()>;

    /// Build the entity with a fresh identity and metadata.
    fn into_entity(self) -> E;
}

/// Input that changes some fields of an existing entity.
pub trait UpdatePayload<E: Entity> {
    fn validate(&self) -> WaybillResult<()>;

    /// Overwrite the fields present in the payload.
    fn apply(&self, entity: &mut E);

    /// Identity recorded as the last modifier.
    fn actor(&self) -> &str;
}

fn require_actor(field: &str, value: &str) -> WaybillResult<()> {
    if value.trim().is_empty() {
        return Err(WaybillError::invalid_field(field, "must not be empty"));
    }
    Ok(())
}

impl Database {
    /// Open the logistics store: versioned orders and deliveries, plain zones.
    pub fn open(config: WaybillConfig) -> WaybillResult<Self> {
        Self::builder(config)
            .versioned::<Order>()?
            .versioned::<Delivery>()?
            .entity::<Zone>()
            .open()
    }

    /// Logistics store in a private in-memory database.
    pub fn in_memory() -> WaybillResult<Self> {
        Self::open(WaybillConfig::in_memory())
    }
}
