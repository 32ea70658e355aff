//! Deliveries: where and in which zone an order is handed over.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_actor, CreatePayload, UpdatePayload};
use crate::entity::{ColumnType, Entity, EntitySchema, Metadata, Versioned};
use crate::error::{WaybillError, WaybillResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub zone_id: Uuid,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Entity for Delivery {
    const NAME: &'static str = "Delivery";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::NAME, "deliveries")
            .key("id")
            .column("order_id", ColumnType::Uuid)
            .column("zone_id", ColumnType::Uuid)
            .column("longitude", ColumnType::Real)
            .column("latitude", ColumnType::Real)
            .with_metadata()
            .unique("order_id")
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

impl Versioned for Delivery {}

pub(crate) fn validate_position(longitude: Option<f64>, latitude: Option<f64>) -> WaybillResult<()> {
    if let Some(lon) = longitude {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(WaybillError::invalid_field(
                "longitude",
                "must be between -180 and 180",
            ));
        }
    }
    if let Some(lat) = latitude {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(WaybillError::invalid_field("latitude", "must be between -90 and 90"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryCreate {
    pub order_id: Uuid,
    pub zone_id: Uuid,
    pub longitude: f64,
    pub latitude: f64,
    pub created_by: String,
}

impl CreatePayload<Delivery> for DeliveryCreate {
    fn validate(&self) -> WaybillResult<()> {
        require_actor("created_by", &self.created_by)?;
        validate_position(Some(self.longitude), Some(self.latitude))
    }

    fn into_entity(self) -> Delivery {
        Delivery {
            id: Uuid::new_v4(),
            order_id: self.order_id,
            zone_id: self.zone_id,
            longitude: self.longitude,
            latitude: self.latitude,
            metadata: Metadata::new(self.created_by),
        }
    }
}

/// Delivery fields that may change. The order a delivery belongs to is fixed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryUpdate {
    #[serde(default)]
    pub zone_id: Option<Uuid>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    pub updated_by: String,
}

impl UpdatePayload<Delivery> for DeliveryUpdate {
    fn validate(&self) -> WaybillResult<()> {
        require_actor("updated_by", &self.updated_by)?;
        validate_position(self.longitude, self.latitude)
    }

    fn apply(&self, delivery: &mut Delivery) {
        if let Some(zone_id) = self.zone_id {
            delivery.zone_id = zone_id;
        }
        if let Some(longitude) = self.longitude {
            delivery.longitude = longitude;
        }
        if let Some(latitude) = self.latitude {
            delivery.latitude = latitude;
        }
    }

    fn actor(&self) -> &str {
        &self.updated_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create() -> DeliveryCreate {
        DeliveryCreate {
            order_id: Uuid::new_v4(),
            zone_id: Uuid::new_v4(),
            longitude: 37.62,
            latitude: 55.75,
            created_by: "dispatcher".into(),
        }
    }

    #[test]
    fn test_position_bounds() {
        create().validate().unwrap();

        let mut payload = create();
        payload.latitude = 91.0;
        let err = payload.validate().unwrap_err();
        assert!(err.to_string().contains("latitude"));

        let update = DeliveryUpdate {
            longitude: Some(f64::NAN),
            updated_by: "courier-7".into(),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_update_keeps_order() {
        let mut delivery = create().into_entity();
        let order_id = delivery.order_id;
        let zone = Uuid::new_v4();

        DeliveryUpdate {
            zone_id: Some(zone),
            updated_by: "courier-7".into(),
            ..Default::default()
        }
        .apply(&mut delivery);

        assert_eq!(delivery.zone_id, zone);
        assert_eq!(delivery.order_id, order_id);
        assert_eq!(delivery.longitude, 37.62);
    }
}
