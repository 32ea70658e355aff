//! Snapshot construction for observed changes.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{HistoryRecord, HistorySchema, Operation};
use crate::entity::{row, Row, Versioned};
use crate::error::{WaybillError, WaybillResult};

/// Copy of an entity's attributes that has not been sequenced yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub operation: Operation,
    pub attributes: Row,
}

impl Snapshot {
    /// Stamp the snapshot with its version and transaction.
    pub fn into_record(
        self,
        version: u32,
        transaction_id: i64,
        changed_at: DateTime<Utc>,
    ) -> HistoryRecord {
        HistoryRecord {
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            version,
            transaction_id,
            operation: self.operation,
            changed_at,
            end_transaction_id: None,
            attributes: self.attributes,
        }
    }
}

/// Builds snapshots from entity state.
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Snapshot a column map as seen after the change.
    ///
    /// For [`Operation::Delete`] the map holds the last values the live row
    /// had before removal. Only business columns are copied; the identity key
    /// is carried as `entity_id`.
    pub fn build(
        schema: &HistorySchema,
        entity_id: Uuid,
        state: &Row,
        operation: Operation,
    ) -> WaybillResult<Snapshot> {
        if let Some(key) = state.get(&schema.key).and_then(Value::as_str) {
            if key != entity_id.to_string() {
                return Err(WaybillError::internal(format!(
                    "{} snapshot for {} carries key {}",
                    schema.name(),
                    entity_id,
                    key
                )));
            }
        }

        let attributes = schema
            .columns()
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    state.get(&c.name).cloned().unwrap_or(Value::Null),
                )
            })
            .collect();

        Ok(Snapshot {
            entity_type: schema.name().to_string(),
            entity_id,
            operation,
            attributes,
        })
    }

    /// Snapshot a typed entity.
    pub fn build_entity<E: Versioned>(
        schema: &HistorySchema,
        entity: &E,
        operation: Operation,
    ) -> WaybillResult<Snapshot> {
        if schema.name() != E::NAME {
            return Err(WaybillError::not_registered(E::NAME));
        }
        let state = row::to_row(entity)?;
        Self::build(schema, entity.id(), &state, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ColumnType, EntitySchema};
    use serde_json::json;

    fn history() -> HistorySchema {
        HistorySchema::derive(
            EntitySchema::new("Parcel", "parcels")
                .key("id")
                .column("weight", ColumnType::Real)
                .nullable_column("label", ColumnType::Text),
        )
        .unwrap()
    }

    #[test]
    fn test_build_copies_business_columns_only() {
        let id = Uuid::new_v4();
        let mut state = Row::new();
        state.insert("id".into(), json!(id.to_string()));
        state.insert("weight".into(), json!(2.5));
        state.insert("transient".into(), json!("dropped"));

        let snapshot = SnapshotBuilder::build(&history(), id, &state, Operation::Insert).unwrap();

        assert_eq!(snapshot.entity_type, "Parcel");
        assert_eq!(snapshot.attributes.len(), 2);
        assert_eq!(snapshot.attributes["weight"], json!(2.5));
        assert_eq!(snapshot.attributes["label"], Value::Null);
        assert!(!snapshot.attributes.contains_key("id"));
        assert!(!snapshot.attributes.contains_key("transient"));
    }

    #[test]
    fn test_build_does_not_touch_source() {
        let id = Uuid::new_v4();
        let mut state = Row::new();
        state.insert("weight".into(), json!(1.0));
        let before = state.clone();

        SnapshotBuilder::build(&history(), id, &state, Operation::Delete).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn test_build_rejects_mismatched_key() {
        let mut state = Row::new();
        state.insert("id".into(), json!(Uuid::new_v4().to_string()));
        assert!(SnapshotBuilder::build(&history(), Uuid::new_v4(), &state, Operation::Update).is_err());
    }

    #[test]
    fn test_into_record() {
        let id = Uuid::new_v4();
        let snapshot = SnapshotBuilder::build(&history(), id, &Row::new(), Operation::Update).unwrap();
        let now = Utc::now();
        let record = snapshot.into_record(4, 17, now);

        assert_eq!(record.entity_id, id);
        assert_eq!(record.version, 4);
        assert_eq!(record.transaction_id, 17);
        assert_eq!(record.operation, Operation::Update);
        assert_eq!(record.changed_at, now);
        assert!(record.end_transaction_id.is_none());
    }
}
