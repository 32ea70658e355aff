//! Registry of versioned entity types and their history tables.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::entity::{Column, EntitySchema, Versioned};
use crate::error::{WaybillError, WaybillResult};

/// Columns every history table carries ahead of the copied business columns.
pub const HISTORY_COLUMNS: [&str; 5] = [
    "entity_id",
    "version",
    "transaction_id",
    "operation",
    "changed_at",
];

/// Twin of a versioned entity's table holding its snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySchema {
    /// Live entity schema this history mirrors.
    pub entity: EntitySchema,
    /// Identity key column of the live table.
    pub key: String,
    /// History table name.
    pub table: String,
}

impl HistorySchema {
    /// Derive the history schema for a live entity schema.
    pub fn derive(entity: EntitySchema) -> WaybillResult<Self> {
        let key = entity
            .key_column()
            .ok_or_else(|| WaybillError::missing_key(&entity.name))?
            .to_string();

        if entity.find_column(&key).is_some() {
            return Err(WaybillError::schema(
                &entity.name,
                format!("identity key '{}' is also declared as a business column", key),
            ));
        }
        if let Some(clash) = entity
            .columns
            .iter()
            .find(|c| HISTORY_COLUMNS.contains(&c.name.as_str()))
        {
            return Err(WaybillError::schema(
                &entity.name,
                format!("column '{}' is reserved by the history table", clash.name),
            ));
        }

        let table = format!("{}_history", entity.table);
        Ok(Self { entity, key, table })
    }

    /// Entity type name.
    pub fn name(&self) -> &str {
        &self.entity.name
    }

    /// Business columns copied into every snapshot.
    pub fn columns(&self) -> &[Column] {
        &self.entity.columns
    }

    /// DDL for the history table, its indexes and its append-only guards.
    pub fn ddl(&self) -> String {
        let t = &self.table;
        let mut defs = vec![
            "entity_id TEXT NOT NULL".to_string(),
            "version INTEGER NOT NULL".to_string(),
            "transaction_id INTEGER NOT NULL".to_string(),
            "operation TEXT NOT NULL".to_string(),
            "changed_at TEXT NOT NULL".to_string(),
        ];
        // Business columns are nullable in history regardless of the live table.
        for column in self.columns() {
            defs.push(format!("{} {}", column.name, column.ty.sql_type()));
        }
        defs.push("UNIQUE(entity_id, version)".to_string());

        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {t} (
                {defs}
            );

            CREATE INDEX IF NOT EXISTS idx_{t}_entity
                ON {t}(entity_id, version DESC);

            CREATE INDEX IF NOT EXISTS idx_{t}_transaction
                ON {t}(transaction_id);

            CREATE INDEX IF NOT EXISTS idx_{t}_time
                ON {t}(entity_id, changed_at);

            CREATE TRIGGER IF NOT EXISTS {t}_no_update
                BEFORE UPDATE ON {t}
                BEGIN SELECT RAISE(ABORT, '{t} is append-only'); END;

            CREATE TRIGGER IF NOT EXISTS {t}_no_delete
                BEFORE DELETE ON {t}
                BEGIN SELECT RAISE(ABORT, '{t} is append-only'); END;
            "#,
            t = t,
            defs = defs.join(",\n                "),
        )
    }
}

/// Versioned entity types keyed by name.
///
/// Registration happens once while the database is being assembled; the
/// registry is read-only afterwards.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: HashMap<String, Arc<HistorySchema>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a versioned entity type.
    ///
    /// Registering the same type again returns the existing history schema.
    pub fn register<E: Versioned>(&mut self) -> WaybillResult<Arc<HistorySchema>> {
        self.register_schema(E::schema())
    }

    /// Register a versioned entity by its schema.
    pub fn register_schema(&mut self, schema: EntitySchema) -> WaybillResult<Arc<HistorySchema>> {
        if let Some(existing) = self.entries.get(&schema.name) {
            if existing.entity != schema {
                return Err(WaybillError::schema(
                    &schema.name,
                    "registered again with a different table layout",
                ));
            }
            debug!(entity = %schema.name, "Versioned type already registered");
            return Ok(existing.clone());
        }

        let history = Arc::new(HistorySchema::derive(schema)?);
        info!(
            entity = %history.name(),
            table = %history.table,
            "Registered versioned type"
        );
        self.entries
            .insert(history.name().to_string(), history.clone());
        Ok(history)
    }

    /// Get the history schema of a registered type.
    pub fn get(&self, entity: &str) -> Option<Arc<HistorySchema>> {
        self.entries.get(entity).cloned()
    }

    /// Get the history schema of a registered type or fail.
    pub fn require(&self, entity: &str) -> WaybillResult<Arc<HistorySchema>> {
        self.get(entity)
            .ok_or_else(|| WaybillError::not_registered(entity))
    }

    /// Whether changes to this entity type are captured in history.
    pub fn is_versioned(&self, entity: &str) -> bool {
        self.entries.contains_key(entity)
    }

    /// All registered history schemas, ordered by entity name.
    pub fn all(&self) -> Vec<Arc<HistorySchema>> {
        let mut all: Vec<_> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ColumnType;
    use crate::error::ErrorCode;

    fn parcel_schema() -> EntitySchema {
        EntitySchema::new("Parcel", "parcels")
            .key("id")
            .column("weight", ColumnType::Real)
            .nullable_column("label", ColumnType::Text)
    }

    #[test]
    fn test_register_derives_history_table() {
        let mut registry = SchemaRegistry::new();
        let history = registry.register_schema(parcel_schema()).unwrap();

        assert_eq!(history.table, "parcels_history");
        assert_eq!(history.key, "id");
        assert_eq!(history.columns().len(), 2);
        assert!(registry.is_versioned("Parcel"));
        assert!(!registry.is_versioned("Zone"));
    }

    #[test]
    fn test_duplicate_registration_is_idempotent() {
        let mut registry = SchemaRegistry::new();
        let first = registry.register_schema(parcel_schema()).unwrap();
        let second = registry.register_schema(parcel_schema()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_changed_layout_is_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register_schema(parcel_schema()).unwrap();
        let err = registry
            .register_schema(parcel_schema().column("fragile", ColumnType::Integer))
            .unwrap_err();
        assert!(matches!(err, WaybillError::Schema { .. }));
    }

    #[test]
    fn test_missing_key_is_schema_error() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register_schema(EntitySchema::new("Loose", "loose").column("x", ColumnType::Text))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchemaMissingKey);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reserved_column_is_schema_error() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register_schema(parcel_schema().column("version", ColumnType::Integer))
            .unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_ddl_creates_append_only_table() {
        let history = HistorySchema::derive(parcel_schema()).unwrap();
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(&history.ddl()).unwrap();
        // Running the DDL twice is harmless.
        conn.execute_batch(&history.ddl()).unwrap();

        conn.execute(
            "INSERT INTO parcels_history (entity_id, version, transaction_id, operation, changed_at)
             VALUES ('p', 1, 1, 'INSERT', '2024-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();

        let update: WaybillError = conn
            .execute("UPDATE parcels_history SET label = 'x'", [])
            .unwrap_err()
            .into();
        assert_eq!(update.code(), ErrorCode::DbAppendOnly);

        let delete: WaybillError = conn
            .execute("DELETE FROM parcels_history", [])
            .unwrap_err()
            .into();
        assert_eq!(delete.code(), ErrorCode::DbAppendOnly);
    }
}
