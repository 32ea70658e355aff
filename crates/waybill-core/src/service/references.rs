//! Links between orders, deliveries and zones.
//!
//! Live tables carry no foreign keys, so the services check references
//! inside the unit of work that writes them.

use serde_json::Value;
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::{WaybillError, WaybillResult};
use crate::models::{Delivery, Order, Zone};
use crate::uow::UnitOfWork;

/// Rules an entity's links must satisfy before a write commits.
pub trait References: Entity {
    /// Everything this entity points at must be live.
    fn check_references(&self, _uow: &UnitOfWork<'_>) -> WaybillResult<()> {
        Ok(())
    }

    /// Nothing live may still point at `id` when it is removed.
    fn check_unreferenced(_uow: &UnitOfWork<'_>, _id: Uuid) -> WaybillResult<()> {
        Ok(())
    }
}

fn uuid_value(id: Uuid) -> Value {
    Value::String(id.to_string())
}

/// The delivery planned for an order, if any.
pub(crate) fn delivery_of(uow: &UnitOfWork<'_>, order_id: Uuid) -> WaybillResult<Option<Delivery>> {
    Ok(uow
        .find_by::<Delivery>("order_id", &uuid_value(order_id))?
        .into_iter()
        .next())
}

impl References for Order {
    fn check_unreferenced(uow: &UnitOfWork<'_>, id: Uuid) -> WaybillResult<()> {
        if let Some(delivery) = delivery_of(uow, id)? {
            return Err(WaybillError::integrity(format!(
                "order {} still has delivery {}",
                id, delivery.id
            )));
        }
        Ok(())
    }
}

impl References for Delivery {
    fn check_references(&self, uow: &UnitOfWork<'_>) -> WaybillResult<()> {
        if uow.get::<Order>(self.order_id)?.is_none() {
            return Err(WaybillError::invalid_field("order_id", "unknown order"));
        }
        if uow.get::<Zone>(self.zone_id)?.is_none() {
            return Err(WaybillError::invalid_field("zone_id", "unknown zone"));
        }
        // One delivery per order.
        if let Some(other) = delivery_of(uow, self.order_id)?.filter(|d| d.id != self.id) {
            return Err(WaybillError::integrity(format!(
                "order {} already has delivery {}",
                self.order_id, other.id
            )));
        }
        Ok(())
    }
}

impl References for Zone {
    fn check_unreferenced(uow: &UnitOfWork<'_>, id: Uuid) -> WaybillResult<()> {
        let users = uow.find_by::<Delivery>("zone_id", &uuid_value(id))?;
        if !users.is_empty() {
            return Err(WaybillError::integrity(format!(
                "zone {} is used by {} deliveries",
                id,
                users.len()
            )));
        }
        Ok(())
    }
}
