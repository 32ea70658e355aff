//! Orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::{require_actor, CreatePayload, UpdatePayload};
use crate::entity::{ColumnType, Entity, EntitySchema, Metadata, Versioned};
use crate::error::WaybillResult;

/// Delivery progress of an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Courier accepted the order.
    Accept,
    /// Courier is on the way.
    Delivering,
    Delivered,
    /// Initial state.
    #[default]
    NotDelivered,
}

/// A customer order assigned to a courier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub courier_id: Uuid,
    pub delivery_date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Entity for Order {
    const NAME: &'static str = "Order";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::NAME, "orders")
            .key("id")
            .column("customer_id", ColumnType::Uuid)
            .column("courier_id", ColumnType::Uuid)
            .column("delivery_date", ColumnType::Timestamp)
            .nullable_column("description", ColumnType::Text)
            .column("status", ColumnType::Text)
            .with_metadata()
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl Versioned for Order {}

/// Fields accepted when creating an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub customer_id: Uuid,
    pub courier_id: Uuid,
    pub delivery_date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_by: String,
}

impl CreatePayload<Order> for OrderCreate {
    fn validate(&self) -> WaybillResult<()> {
        require_actor("created_by", &self.created_by)
    }

    fn into_entity(self) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer_id: self.customer_id,
            courier_id: self.courier_id,
            delivery_date: self.delivery_date,
            description: self.description,
            status: self.status,
            metadata: Metadata::new(self.created_by),
        }
    }
}

/// Fields accepted when updating an order. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderUpdate {
    #[serde(default)]
    pub courier_id: Option<Uuid>,
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    pub updated_by: String,
}

impl UpdatePayload<Order> for OrderUpdate {
    fn validate(&self) -> WaybillResult<()> {
        require_actor("updated_by", &self.updated_by)
    }

    fn apply(&self, order: &mut Order) {
        if let Some(courier_id) = self.courier_id {
            order.courier_id = courier_id;
        }
        if let Some(delivery_date) = self.delivery_date {
            order.delivery_date = delivery_date;
        }
        if let Some(description) = &self.description {
            order.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            order.status = status;
        }
    }

    fn actor(&self) -> &str {
        &self.updated_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::row;
    use serde_json::json;

    fn create() -> OrderCreate {
        OrderCreate {
            customer_id: Uuid::new_v4(),
            courier_id: Uuid::new_v4(),
            delivery_date: Utc::now(),
            description: None,
            status: OrderStatus::default(),
            created_by: "dispatcher".into(),
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(OrderStatus::default(), OrderStatus::NotDelivered);
        assert_eq!(OrderStatus::NotDelivered.to_string(), "not_delivered");
        assert_eq!("delivering".parse::<OrderStatus>().unwrap(), OrderStatus::Delivering);
        assert_eq!(serde_json::to_value(OrderStatus::Accept).unwrap(), json!("accept"));
    }

    #[test]
    fn test_create_defaults() {
        let payload: OrderCreate = serde_json::from_value(json!({
            "customer_id": Uuid::new_v4(),
            "courier_id": Uuid::new_v4(),
            "delivery_date": "2024-05-01T10:00:00Z",
            "created_by": "dispatcher"
        }))
        .unwrap();
        payload.validate().unwrap();

        let order = payload.into_entity();
        assert_eq!(order.status, OrderStatus::NotDelivered);
        assert_eq!(order.metadata.updated_by.as_deref(), Some("dispatcher"));
    }

    #[test]
    fn test_blank_creator_is_rejected() {
        let mut payload = create();
        payload.created_by = "  ".into();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_update_applies_present_fields_only() {
        let mut order = create().into_entity();
        let courier = order.courier_id;
        let update = OrderUpdate {
            status: Some(OrderStatus::Delivering),
            description: Some("leave at the door".into()),
            updated_by: "courier-7".into(),
            ..Default::default()
        };

        update.apply(&mut order);
        assert_eq!(order.status, OrderStatus::Delivering);
        assert_eq!(order.description.as_deref(), Some("leave at the door"));
        assert_eq!(order.courier_id, courier);
        assert_eq!(update.actor(), "courier-7");
    }

    #[test]
    fn test_row_matches_schema() {
        let order = create().into_entity();
        let state = row::to_row(&order).unwrap();
        let schema = Order::schema();

        assert_eq!(state.len(), schema.columns.len() + 1);
        for column in &schema.columns {
            assert!(state.contains_key(&column.name), "missing {}", column.name);
        }
        assert_eq!(row::from_row::<Order>(state).unwrap(), order);
    }
}
