//! Table descriptions for live entities.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    /// Hyphenated UUID stored as text.
    Uuid,
    /// RFC 3339 timestamp stored as text.
    Timestamp,
    /// Arbitrary JSON stored as text.
    Json,
}

impl ColumnType {
    /// SQLite type affinity for this column.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text | Self::Uuid | Self::Timestamp | Self::Json => "TEXT",
        }
    }
}

/// A business column of an entity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
}

/// Description of a live entity table.
///
/// The identity key is kept apart from the business columns: it becomes
/// `entity_id` in the history table while every business column is copied
/// over as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    /// Entity type name, used as the registry key.
    pub name: String,
    /// Live table name.
    pub table: String,
    /// Identity key column (a UUID primary key).
    pub key: Option<String>,
    /// Business columns in declaration order.
    pub columns: Vec<Column>,
    /// Columns no two live rows may share.
    pub unique: Vec<String>,
}

impl EntitySchema {
    /// Start a schema for an entity type stored in `table`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            key: None,
            columns: Vec::new(),
            unique: Vec::new(),
        }
    }

    /// Builder: set the identity key column.
    pub fn key(mut self, column: impl Into<String>) -> Self {
        self.key = Some(column.into());
        self
    }

    /// Builder: add a required column.
    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(Column {
            name: name.into(),
            ty,
            nullable: false,
        });
        self
    }

    /// Builder: add a nullable column.
    pub fn nullable_column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(Column {
            name: name.into(),
            ty,
            nullable: true,
        });
        self
    }

    /// Builder: no two live rows may hold the same value in `column`.
    ///
    /// Only the live table is constrained; history keeps every version.
    pub fn unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }

    /// Builder: add the audit and timestamp columns of [`Metadata`](super::Metadata).
    pub fn with_metadata(self) -> Self {
        self.column("created_at", ColumnType::Timestamp)
            .column("updated_at", ColumnType::Timestamp)
            .column("created_by", ColumnType::Text)
            .nullable_column("updated_by", ColumnType::Text)
    }

    /// Identity key column, if declared.
    pub fn key_column(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Look up a business column by name.
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `CREATE TABLE` and unique index statements for the live table.
    pub fn live_table_ddl(&self, key: &str) -> String {
        let mut defs = vec![format!("{} TEXT PRIMARY KEY", key)];
        for column in &self.columns {
            defs.push(format!(
                "{} {}{}",
                column.name,
                column.ty.sql_type(),
                if column.nullable { "" } else { " NOT NULL" }
            ));
        }
        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table,
            defs.join(",\n    ")
        );
        for column in &self.unique {
            ddl.push_str(&format!(
                ";\nCREATE UNIQUE INDEX IF NOT EXISTS {table}_{column}_unique ON {table} ({column})",
                table = self.table,
                column = column
            ));
        }
        ddl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_ddl() {
        let schema = EntitySchema::new("Zone", "zones")
            .key("id")
            .column("name", ColumnType::Text)
            .nullable_column("coordinates", ColumnType::Json);

        assert_eq!(schema.key_column(), Some("id"));
        assert!(schema.find_column("coordinates").unwrap().nullable);

        let ddl = schema.live_table_ddl("id");
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS zones"));
        assert!(ddl.contains("id TEXT PRIMARY KEY"));
        assert!(ddl.contains("name TEXT NOT NULL"));
        assert!(ddl.contains("coordinates TEXT\n") || ddl.ends_with("coordinates TEXT\n)"));
    }

    #[test]
    fn test_unique_column_is_indexed() {
        let schema = EntitySchema::new("Delivery", "deliveries")
            .key("id")
            .column("order_id", ColumnType::Uuid)
            .unique("order_id");

        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(&schema.live_table_ddl("id")).unwrap();
        // Applying the statements again is harmless.
        conn.execute_batch(&schema.live_table_ddl("id")).unwrap();

        conn.execute("INSERT INTO deliveries VALUES ('a', 'o1')", []).unwrap();
        assert!(conn.execute("INSERT INTO deliveries VALUES ('b', 'o1')", []).is_err());
        conn.execute("INSERT INTO deliveries VALUES ('c', 'o2')", []).unwrap();
    }

    #[test]
    fn test_blank_key_is_no_key() {
        let schema = EntitySchema::new("Broken", "broken").key("  ");
        assert_eq!(schema.key_column(), None);
    }

    #[test]
    fn test_column_type_names() {
        assert_eq!(ColumnType::Timestamp.to_string(), "timestamp");
        assert_eq!("json".parse::<ColumnType>().unwrap(), ColumnType::Json);
        assert_eq!(ColumnType::Uuid.sql_type(), "TEXT");
    }
}
