//! History storage layer with point-in-time query support.
//!
//! One append-only table per versioned entity type. The store exposes no
//! update or delete operations, and the tables refuse them via triggers.

use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use tracing::debug;
use uuid::Uuid;

use super::record::{format_timestamp, parse_timestamp};
use super::{HistoryRecord, HistorySchema, HistorySummary, Operation};
use crate::entity::{row, Row};
use crate::error::{WaybillError, WaybillResult};

/// Append-only access to the history of one entity type.
pub trait HistoryStore {
    /// Persist one record.
    fn append(&self, record: &HistoryRecord) -> WaybillResult<()>;

    /// All records of an entity, ordered by version ascending.
    fn history_of(&self, entity_id: Uuid) -> WaybillResult<Vec<HistoryRecord>>;

    /// A specific version.
    fn at_version(&self, entity_id: Uuid, version: u32) -> WaybillResult<Option<HistoryRecord>>;

    /// The newest record.
    fn latest(&self, entity_id: Uuid) -> WaybillResult<Option<HistoryRecord>>;
}

/// SQLite-backed history store.
///
/// Generic over how the connection is held: a plain reference or the
/// transaction of an open unit of work.
pub struct SqliteHistoryStore<C> {
    conn: C,
    schema: Arc<HistorySchema>,
}

impl<C: Deref<Target = Connection>> SqliteHistoryStore<C> {
    pub fn new(conn: C, schema: Arc<HistorySchema>) -> Self {
        Self { conn, schema }
    }

    /// Schema of the table this store reads and writes.
    pub fn schema(&self) -> &HistorySchema {
        &self.schema
    }

    /// Entity state at a point in time.
    pub fn at_time(
        &self,
        entity_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> WaybillResult<Option<HistoryRecord>> {
        let sql = self.select_sql(
            "entity_id = ?1",
            "WHERE changed_at <= ?2 ORDER BY version DESC LIMIT 1",
        );
        self.query_one(
            &sql,
            params![entity_id.to_string(), format_timestamp(&timestamp)],
        )
    }

    /// The version that was current once `transaction_id` committed.
    pub fn as_of_transaction(
        &self,
        entity_id: Uuid,
        transaction_id: i64,
    ) -> WaybillResult<Option<HistoryRecord>> {
        let sql = self.select_sql(
            "entity_id = ?1",
            "WHERE transaction_id <= ?2 ORDER BY version DESC LIMIT 1",
        );
        self.query_one(&sql, params![entity_id.to_string(), transaction_id])
    }

    /// Records captured within a time range, ordered by version.
    pub fn in_range(
        &self,
        entity_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> WaybillResult<Vec<HistoryRecord>> {
        let sql = self.select_sql(
            "entity_id = ?1",
            "WHERE changed_at >= ?2 AND changed_at <= ?3 ORDER BY version ASC",
        );
        self.query_all(
            &sql,
            params![
                entity_id.to_string(),
                format_timestamp(&start),
                format_timestamp(&end)
            ],
        )
    }

    /// Every record of this entity type produced by one unit of work.
    pub fn in_transaction(&self, transaction_id: i64) -> WaybillResult<Vec<HistoryRecord>> {
        let sql = self.select_sql(
            &format!(
                "entity_id IN (SELECT entity_id FROM {} WHERE transaction_id = ?1)",
                self.schema.table
            ),
            "WHERE transaction_id = ?1 ORDER BY entity_id ASC, version ASC",
        );
        self.query_all(&sql, params![transaction_id])
    }

    /// Summary of an entity's history.
    pub fn summary(&self, entity_id: Uuid) -> WaybillResult<Option<HistorySummary>> {
        let sql = format!(
            r#"SELECT
                COUNT(*) as total,
                MAX(version) as latest,
                MIN(changed_at) as first,
                MAX(changed_at) as last,
                SUM(CASE WHEN operation = 'INSERT' THEN 1 ELSE 0 END) as inserts,
                SUM(CASE WHEN operation = 'UPDATE' THEN 1 ELSE 0 END) as updates,
                SUM(CASE WHEN operation = 'DELETE' THEN 1 ELSE 0 END) as deletes
               FROM {}
               WHERE entity_id = ?1"#,
            self.schema.table
        );

        let raw = self
            .conn
            .query_row(&sql, params![entity_id.to_string()], |row| {
                let total: u32 = row.get(0)?;
                if total == 0 {
                    return Ok(None);
                }
                Ok(Some((
                    total,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, u32>(6)?,
                )))
            })
            .optional()?
            .flatten();

        raw.map(|(total, latest, first, last, inserts, updates, deletes)| {
            Ok(HistorySummary {
                entity_type: self.schema.name().to_string(),
                entity_id,
                total_versions: total,
                latest_version: latest,
                first_captured: parse_timestamp(&first)?,
                last_captured: parse_timestamp(&last)?,
                inserts,
                updates,
                deletes,
            })
        })
        .transpose()
    }

    /// Number of records across all entities of this type.
    pub fn count_all(&self) -> WaybillResult<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.schema.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Highest transaction id recorded in this table.
    pub fn max_transaction_id(&self) -> WaybillResult<Option<i64>> {
        Ok(self.conn.query_row(
            &format!("SELECT MAX(transaction_id) FROM {}", self.schema.table),
            [],
            |row| row.get(0),
        )?)
    }

    /// Outer SELECT over an inner filtered scan.
    ///
    /// The validity window is computed over the whole entity history before
    /// the outer filter narrows the result.
    fn select_sql(&self, inner_filter: &str, outer: &str) -> String {
        let business: Vec<&str> = self
            .schema
            .columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        let mut columns = vec![
            "entity_id",
            "version",
            "transaction_id",
            "operation",
            "changed_at",
            "end_transaction_id",
        ];
        columns.extend(business);

        format!(
            r#"SELECT {columns} FROM (
                   SELECT *, LEAD(transaction_id) OVER (
                       PARTITION BY entity_id ORDER BY version
                   ) AS end_transaction_id
                   FROM {table}
                   WHERE {inner_filter}
               ) {outer}"#,
            columns = columns.join(", "),
            table = self.schema.table,
        )
    }

    fn query_one(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> WaybillResult<Option<HistoryRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        stmt.query_row(params, |row| Ok(self.row_to_record(row)))
            .optional()?
            .transpose()
    }

    fn query_all(&self, sql: &str, params: &[&dyn ToSql]) -> WaybillResult<Vec<HistoryRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let results = stmt.query_map(params, |row| Ok(self.row_to_record(row)))?;

        results
            .map(|r| r.map_err(WaybillError::from).and_then(|inner| inner))
            .collect()
    }

    fn row_to_record(&self, row: &rusqlite::Row<'_>) -> WaybillResult<HistoryRecord> {
        let entity_id: String = row.get(0)?;
        let version: u32 = row.get(1)?;
        let transaction_id: i64 = row.get(2)?;
        let operation: String = row.get(3)?;
        let changed_at: String = row.get(4)?;
        let end_transaction_id: Option<i64> = row.get(5)?;

        let mut attributes = Row::new();
        for (offset, column) in self.schema.columns().iter().enumerate() {
            let value = row::from_sql(&column.name, column.ty, row.get_ref(6 + offset)?)?;
            attributes.insert(column.name.clone(), value);
        }

        Ok(HistoryRecord {
            entity_type: self.schema.name().to_string(),
            entity_id: Uuid::parse_str(&entity_id)
                .map_err(|e| WaybillError::parse(e.to_string()))?,
            version,
            transaction_id,
            operation: operation
                .parse::<Operation>()
                .map_err(|e| WaybillError::parse(format!("operation '{}': {}", operation, e)))?,
            changed_at: parse_timestamp(&changed_at)?,
            end_transaction_id,
            attributes,
        })
    }
}

impl<C: Deref<Target = Connection>> HistoryStore for SqliteHistoryStore<C> {
    fn append(&self, record: &HistoryRecord) -> WaybillResult<()> {
        if record.entity_type != self.schema.name() {
            return Err(WaybillError::internal(format!(
                "{} record appended to {}",
                record.entity_type, self.schema.table
            )));
        }

        let mut names = vec![
            "entity_id".to_string(),
            "version".to_string(),
            "transaction_id".to_string(),
            "operation".to_string(),
            "changed_at".to_string(),
        ];
        let mut values = vec![
            SqlValue::Text(record.entity_id.to_string()),
            SqlValue::Integer(record.version as i64),
            SqlValue::Integer(record.transaction_id),
            SqlValue::Text(record.operation.as_str().to_string()),
            SqlValue::Text(format_timestamp(&record.changed_at)),
        ];
        for column in self.schema.columns() {
            names.push(column.name.clone());
            values.push(row::to_sql(
                &column.name,
                column.ty,
                record.attributes.get(&column.name),
            )?);
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.schema.table,
                names.join(", "),
                placeholders.join(", ")
            ),
            params_from_iter(values),
        )?;

        debug!(
            entity = %record.entity_type,
            entity_id = %record.entity_id,
            version = record.version,
            transaction_id = record.transaction_id,
            operation = %record.operation,
            "Appended history record"
        );
        Ok(())
    }

    fn history_of(&self, entity_id: Uuid) -> WaybillResult<Vec<HistoryRecord>> {
        let sql = self.select_sql("entity_id = ?1", "ORDER BY version ASC");
        self.query_all(&sql, params![entity_id.to_string()])
    }

    fn at_version(&self, entity_id: Uuid, version: u32) -> WaybillResult<Option<HistoryRecord>> {
        let sql = self.select_sql("entity_id = ?1", "WHERE version = ?2");
        self.query_one(&sql, params![entity_id.to_string(), version])
    }

    fn latest(&self, entity_id: Uuid) -> WaybillResult<Option<HistoryRecord>> {
        let sql = self.select_sql("entity_id = ?1", "ORDER BY version DESC LIMIT 1");
        self.query_one(&sql, params![entity_id.to_string()])
    }
}
