//! Delivery zones. Zones are reference data and keep no history.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_actor, CreatePayload, UpdatePayload};
use crate::entity::{ColumnType, Entity, EntitySchema, Metadata};
use crate::error::{WaybillError, WaybillResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: Uuid,
    pub name: String,
    /// Boundary as a flat list of coordinates.
    pub coordinates: Vec<f64>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Entity for Zone {
    const NAME: &'static str = "Zone";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::NAME, "zones")
            .key("id")
            .column("name", ColumnType::Text)
            .column("coordinates", ColumnType::Json)
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

fn validate_name(name: &str) -> WaybillResult<()> {
    if name.trim().is_empty() {
        return Err(WaybillError::invalid_field("name", "must not be empty"));
    }
    Ok(())
}

fn validate_coordinates(coordinates: &[f64]) -> WaybillResult<()> {
    if coordinates.is_empty() {
        return Err(WaybillError::invalid_field("coordinates", "must not be empty"));
    }
    if coordinates.iter().any(|c| !c.is_finite()) {
        return Err(WaybillError::invalid_field("coordinates", "must be finite numbers"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneCreate {
    pub name: String,
    pub coordinates: Vec<f64>,
    pub created_by: String,
}

impl CreatePayload<Zone> for ZoneCreate {
    fn validate(&self) -> WaybillResult<()> {
        require_actor("created_by", &self.created_by)?;
        validate_name(&self.name)?;
        validate_coordinates(&self.coordinates)
    }

    fn into_entity(self) -> Zone {
        Zone {
            id: Uuid::new_v4(),
            name: self.name,
            coordinates: self.coordinates,
            metadata: Metadata::new(self.created_by),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Vec<f64>>,
    pub updated_by: String,
}

impl UpdatePayload<Zone> for ZoneUpdate {
    fn validate(&self) -> WaybillResult<()> {
        require_actor("updated_by", &self.updated_by)?;
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(coordinates) = &self.coordinates {
            validate_coordinates(coordinates)?;
        }
        Ok(())
    }

    fn apply(&self, zone: &mut Zone) {
        if let Some(name) = &self.name {
            zone.name = name.clone();
        }
        if let Some(coordinates) = &self.coordinates {
            zone.coordinates = coordinates.clone();
        }
    }

    fn actor(&self) -> &str {
        &self.updated_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_validation() {
        let payload = ZoneCreate {
            name: "north".into(),
            coordinates: vec![37.6, 55.7, 37.7, 55.8],
            created_by: "dispatcher".into(),
        };
        payload.validate().unwrap();

        let empty = ZoneCreate {
            coordinates: Vec::new(),
            ..payload.clone()
        };
        assert!(empty.validate().is_err());

        let unnamed = ZoneCreate {
            name: String::new(),
            ..payload
        };
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_update_apply() {
        let mut zone = ZoneCreate {
            name: "north".into(),
            coordinates: vec![1.0, 2.0],
            created_by: "dispatcher".into(),
        }
        .into_entity();

        ZoneUpdate {
            name: Some("north-east".into()),
            updated_by: "dispatcher".into(),
            ..Default::default()
        }
        .apply(&mut zone);

        assert_eq!(zone.name, "north-east");
        assert_eq!(zone.coordinates, vec![1.0, 2.0]);
    }
}
