//! Version numbers and transaction ids.
//!
//! Version numbers are read from the history table inside the writing
//! transaction. Transaction ids come from an injected [`SequenceProvider`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use rusqlite::{params, Connection};
use tracing::debug;
use uuid::Uuid;

use super::HistorySchema;
use crate::error::WaybillResult;

/// Source of process-wide increasing transaction ids.
#[cfg_attr(test, mockall::automock)]
pub trait SequenceProvider: Send + Sync {
    /// Allocate the next id, using `conn` when the sequence lives in the database.
    fn next(&self, conn: &Connection) -> WaybillResult<i64>;
}

/// Sequence stored as a row of the database.
///
/// The increment runs inside the unit of work, so an id consumed by a
/// rolled-back transaction is handed out again and never becomes visible.
pub struct TableSequence {
    name: String,
}

impl TableSequence {
    pub const TABLE: &'static str = "waybill_sequences";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Create the sequence table.
    pub fn init_schema(conn: &Connection) -> WaybillResult<()> {
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            "#,
            Self::TABLE
        ))?;
        Ok(())
    }

    /// Make sure the next id handed out is above `last`.
    ///
    /// Never moves the sequence backwards.
    pub fn seed(&self, conn: &Connection, last: i64) -> WaybillResult<()> {
        conn.execute(
            &format!(
                r#"INSERT INTO {} (name, value) VALUES (?1, ?2)
                   ON CONFLICT(name) DO UPDATE SET value = MAX(value, excluded.value)"#,
                Self::TABLE
            ),
            params![self.name, last],
        )?;
        debug!(sequence = %self.name, last, "Seeded sequence");
        Ok(())
    }
}

impl Default for TableSequence {
    fn default() -> Self {
        Self::new("transaction_id")
    }
}

impl SequenceProvider for TableSequence {
    fn next(&self, conn: &Connection) -> WaybillResult<i64> {
        let value = conn.query_row(
            &format!(
                r#"INSERT INTO {} (name, value) VALUES (?1, 1)
                   ON CONFLICT(name) DO UPDATE SET value = value + 1
                   RETURNING value"#,
                Self::TABLE
            ),
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(value)
    }
}

/// In-process counter.
///
/// Only monotonic across units of work of one process; seed it with the
/// highest committed transaction id when opening an existing database.
#[derive(Debug, Default)]
pub struct AtomicSequence {
    last: AtomicI64,
}

impl AtomicSequence {
    pub fn starting_after(last: i64) -> Self {
        Self {
            last: AtomicI64::new(last),
        }
    }
}

impl SequenceProvider for AtomicSequence {
    fn next(&self, _conn: &Connection) -> WaybillResult<i64> {
        Ok(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Assigns version numbers and transaction ids to snapshots.
#[derive(Clone)]
pub struct VersionSequencer {
    provider: Arc<dyn SequenceProvider>,
}

impl VersionSequencer {
    pub fn new(provider: Arc<dyn SequenceProvider>) -> Self {
        Self { provider }
    }

    /// One past the highest stored version of `entity_id`, or 1.
    ///
    /// Must run on the connection of the writing transaction.
    pub fn next_version(
        &self,
        conn: &Connection,
        schema: &HistorySchema,
        entity_id: Uuid,
    ) -> WaybillResult<u32> {
        let max: Option<u32> = conn.query_row(
            &format!(
                "SELECT MAX(version) FROM {} WHERE entity_id = ?1",
                schema.table
            ),
            params![entity_id.to_string()],
            |row| row.get(0),
        )?;
        let next = max.unwrap_or(0) + 1;
        debug!(entity = %schema.name(), %entity_id, version = next, "Sequenced version");
        Ok(next)
    }

    /// Allocate the id shared by every snapshot of one unit of work.
    pub fn allocate_transaction_id(&self, conn: &Connection) -> WaybillResult<i64> {
        self.provider.next(conn)
    }
}
