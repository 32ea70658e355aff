//! Order operations that span an order and its delivery.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::crud::{update_in, CrudService};
use super::references::{delivery_of, References};
use super::Page;
use crate::entity::Entity;
use crate::error::{WaybillError, WaybillResult};
use crate::models::{
    CreatePayload, Delivery, DeliveryCreate, DeliveryUpdate, Order, OrderCreate, OrderUpdate,
    UpdatePayload,
};
use crate::uow::Database;

/// Where an order created together with its delivery is handed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPlacement {
    pub zone_id: Uuid,
    pub longitude: f64,
    pub latitude: f64,
}

/// Request creating an order and its delivery at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithDeliveryCreate {
    #[serde(flatten)]
    pub order: OrderCreate,
    pub delivery: DeliveryPlacement,
}

/// An order with its delivery, if one is planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub delivery: Option<Delivery>,
}

/// Orders, with cascades onto their deliveries.
#[derive(Clone)]
pub struct OrderService {
    orders: CrudService<Order, OrderCreate, OrderUpdate>,
    db: Arc<Database>,
}

impl OrderService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            orders: CrudService::new(db.clone()),
            db,
        }
    }

    /// Generic operations and history for orders.
    pub fn orders(&self) -> &CrudService<Order, OrderCreate, OrderUpdate> {
        &self.orders
    }

    pub fn get(&self, id: Uuid) -> WaybillResult<Option<Order>> {
        self.orders.get(id)
    }

    pub fn list(&self, page: Page) -> WaybillResult<Vec<Order>> {
        self.orders.list(page)
    }

    pub fn create(&self, payload: OrderCreate) -> WaybillResult<Order> {
        self.orders.create(payload)
    }

    pub fn update(&self, id: Uuid, payload: &OrderUpdate) -> WaybillResult<Order> {
        self.orders.update(id, payload)
    }

    /// An order together with its delivery.
    pub fn details(&self, id: Uuid) -> WaybillResult<Option<OrderDetails>> {
        self.db.read(|uow| {
            let Some(order) = uow.get::<Order>(id)? else {
                return Ok(None);
            };
            let delivery = delivery_of(uow, id)?;
            Ok(Some(OrderDetails { order, delivery }))
        })
    }

    /// Create an order and its delivery in one unit of work.
    pub fn create_with_delivery(&self, payload: OrderWithDeliveryCreate) -> WaybillResult<OrderDetails> {
        payload.order.validate()?;
        let created_by = payload.order.created_by.clone();
        let order = payload.order.into_entity();
        let delivery_payload = DeliveryCreate {
            order_id: order.id,
            zone_id: payload.delivery.zone_id,
            longitude: payload.delivery.longitude,
            latitude: payload.delivery.latitude,
            created_by,
        };
        delivery_payload.validate()?;
        let delivery = delivery_payload.into_entity();

        self.db.transaction(|uow| {
            uow.insert(&order)?;
            delivery.check_references(uow)?;
            uow.insert(&delivery)
        })?;

        info!(order = %order.id, delivery = %delivery.id, "Created order with delivery");
        Ok(OrderDetails {
            order,
            delivery: Some(delivery),
        })
    }

    /// Update an order and its delivery in one unit of work.
    pub fn update_with_delivery(
        &self,
        id: Uuid,
        order: &OrderUpdate,
        delivery: &DeliveryUpdate,
    ) -> WaybillResult<OrderDetails> {
        order.validate()?;
        delivery.validate()?;

        self.db.transaction(|uow| {
            let updated: Order = update_in(uow, id, order)?;
            let current = delivery_of(uow, id)?
                .ok_or_else(|| WaybillError::not_found(Delivery::NAME, format!("order {}", id)))?;
            let moved: Delivery = update_in(uow, current.id, delivery)?;
            Ok(OrderDetails {
                order: updated,
                delivery: Some(moved),
            })
        })
    }

    /// Delete an order and its delivery in one unit of work.
    pub fn remove(&self, id: Uuid) -> WaybillResult<Option<Order>> {
        let removed = self.db.transaction(|uow| {
            let Some(order) = uow.delete::<Order>(id)? else {
                return Ok(None);
            };
            if let Some(delivery) = delivery_of(uow, id)? {
                uow.delete::<Delivery>(delivery.id)?;
            }
            Ok(Some(order))
        })?;

        if removed.is_some() {
            info!(order = %id, "Removed order and its delivery");
        }
        Ok(removed)
    }
}
