//! Hooks run by a unit of work right before it commits.

use rusqlite::Connection;

use super::ChangeSet;
use crate::error::WaybillResult;
use crate::versioning::{HistoryRecord, VersionSequencer};

/// Observer of a unit of work's pending changes.
///
/// Hooks are identified by name; a unit of work runs each name once.
pub trait FlushHook: Send + Sync {
    fn name(&self) -> &str;

    /// Called once, inside the transaction, after the unit of work's own
    /// writes and before commit. An error aborts the whole unit of work.
    fn before_flush(&self, ctx: &mut FlushContext<'_>) -> WaybillResult<()>;
}

/// What a hook sees of the unit of work being flushed.
pub struct FlushContext<'a> {
    conn: &'a Connection,
    changes: &'a ChangeSet,
    sequencer: &'a VersionSequencer,
    transaction_id: &'a mut Option<i64>,
    queued: &'a mut Vec<HistoryRecord>,
}

impl<'a> FlushContext<'a> {
    pub(crate) fn new(
        conn: &'a Connection,
        changes: &'a ChangeSet,
        sequencer: &'a VersionSequencer,
        transaction_id: &'a mut Option<i64>,
        queued: &'a mut Vec<HistoryRecord>,
    ) -> Self {
        Self {
            conn,
            changes,
            sequencer,
            transaction_id,
            queued,
        }
    }

    /// Connection of the open transaction.
    pub fn connection(&self) -> &'a Connection {
        self.conn
    }

    /// Net pending changes.
    pub fn changes(&self) -> &'a ChangeSet {
        self.changes
    }

    /// Id of this unit of work, allocated on first use.
    pub fn transaction_id(&mut self) -> WaybillResult<i64> {
        allocate(self.transaction_id, self.sequencer, self.conn)
    }

    /// Queue a history record to be appended before commit.
    pub fn queue(&mut self, record: HistoryRecord) {
        self.queued.push(record);
    }

    /// Records queued so far by earlier hooks.
    pub fn queued(&self) -> &[HistoryRecord] {
        self.queued
    }
}

pub(crate) fn allocate(
    slot: &mut Option<i64>,
    sequencer: &VersionSequencer,
    conn: &Connection,
) -> WaybillResult<i64> {
    if let Some(id) = *slot {
        return Ok(id);
    }
    let id = sequencer.allocate_transaction_id(conn)?;
    *slot = Some(id);
    Ok(id)
}
