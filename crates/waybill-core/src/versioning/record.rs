//! History record types for audit trails and point-in-time queries.
//!
//! A record is an immutable copy of one entity's attributes as of a committed
//! unit of work, tagged with its per-entity version number and the id of the
//! transaction that produced it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::entity::{row, Entity, Row};
use crate::error::{WaybillError, WaybillResult};

/// Kind of change that produced a history record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Entity was created.
    Insert,
    /// Entity attributes changed.
    Update,
    /// Entity was removed; the record is a tombstone.
    Delete,
}

impl Operation {
    /// Convert to string for storage.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A snapshot of one entity at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Entity type this record belongs to.
    pub entity_type: String,
    /// Identity of the live entity.
    pub entity_id: Uuid,
    /// Sequential version within this entity (1, 2, 3...).
    pub version: u32,
    /// Unit of work that produced this record.
    pub transaction_id: i64,
    /// What produced this record.
    pub operation: Operation,
    /// When the record was captured.
    pub changed_at: DateTime<Utc>,
    /// Transaction at which this version stopped being current.
    ///
    /// Derived on read from the next version; `None` for the newest record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_transaction_id: Option<i64>,
    /// Business attributes at this version.
    pub attributes: Row,
}

impl HistoryRecord {
    /// Whether this record ends the entity's lifecycle.
    pub fn is_tombstone(&self) -> bool {
        self.operation == Operation::Delete
    }

    /// Get a single attribute.
    pub fn attribute(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column).filter(|v| !v.is_null())
    }

    /// Rebuild the entity as it was at this version.
    pub fn state<E: Entity>(&self) -> WaybillResult<E> {
        if self.entity_type != E::NAME {
            return Err(WaybillError::parse(format!(
                "record of '{}' cannot be read as '{}'",
                self.entity_type,
                E::NAME
            )));
        }
        let schema = E::schema();
        let key = schema
            .key_column()
            .ok_or_else(|| WaybillError::missing_key(E::NAME))?;

        let mut attributes = self.attributes.clone();
        attributes.insert(key.to_string(), Value::String(self.entity_id.to_string()));
        row::from_row(attributes)
    }
}

/// Fixed-width RFC 3339 text so captured times sort lexically.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> WaybillResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WaybillError::parse(e.to_string()))
}

/// Summary of the change history of one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub total_versions: u32,
    pub latest_version: u32,
    pub first_captured: DateTime<Utc>,
    pub last_captured: DateTime<Utc>,
    pub inserts: u32,
    pub updates: u32,
    pub deletes: u32,
}

impl HistorySummary {
    /// Whether the entity's lifecycle has ended.
    pub fn is_deleted(&self) -> bool {
        self.deletes > 0
    }
}
