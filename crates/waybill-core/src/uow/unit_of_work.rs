//! A single atomic batch of entity changes.

use std::sync::Arc;

use rusqlite::{Connection, Transaction};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::change::diff_columns;
use super::hook::{allocate, FlushContext, FlushHook};
use super::live::LiveTable;
use super::ChangeSet;
use crate::entity::{row, Entity, Versioned};
use crate::error::{WaybillError, WaybillResult};
use crate::versioning::{
    HistoryRecord, HistoryStore, SchemaRegistry, SqliteHistoryStore, VersionSequencer,
};

/// Changes made through one database transaction.
///
/// Live rows are written as soon as an operation is called, so reads inside
/// the unit of work see its own changes. The net change set is kept alongside
/// and handed to the flush hooks before commit. Dropping a unit of work
/// without committing rolls everything back.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    registry: Arc<SchemaRegistry>,
    sequencer: VersionSequencer,
    changes: ChangeSet,
    hooks: Vec<Arc<dyn FlushHook>>,
    transaction_id: Option<i64>,
}

impl<'conn> UnitOfWork<'conn> {
    pub(crate) fn new(
        tx: Transaction<'conn>,
        registry: Arc<SchemaRegistry>,
        sequencer: VersionSequencer,
    ) -> Self {
        Self {
            tx,
            registry,
            sequencer,
            changes: ChangeSet::new(),
            hooks: Vec::new(),
            transaction_id: None,
        }
    }

    fn conn(&self) -> &Connection {
        &self.tx
    }

    /// Fetch a live entity.
    pub fn get<E: Entity>(&self, id: Uuid) -> WaybillResult<Option<E>> {
        let schema = E::schema();
        LiveTable::new(self.conn(), &schema)?
            .get(id)?
            .map(row::from_row)
            .transpose()
    }

    /// Page through live entities in insertion order.
    pub fn list<E: Entity>(&self, skip: usize, limit: usize) -> WaybillResult<Vec<E>> {
        let schema = E::schema();
        LiveTable::new(self.conn(), &schema)?
            .list(skip, limit)?
            .into_iter()
            .map(row::from_row)
            .collect()
    }

    /// Live entities whose `column` equals `value`.
    pub fn find_by<E: Entity>(&self, column: &str, value: &Value) -> WaybillResult<Vec<E>> {
        let schema = E::schema();
        LiveTable::new(self.conn(), &schema)?
            .find_by(column, value)?
            .into_iter()
            .map(row::from_row)
            .collect()
    }

    /// Number of live entities of a type.
    pub fn count<E: Entity>(&self) -> WaybillResult<usize> {
        let schema = E::schema();
        LiveTable::new(self.conn(), &schema)?.count()
    }

    /// Create a live entity.
    ///
    /// A versioned identity whose committed history ends in a tombstone
    /// cannot be created again. Deleting and re-inserting inside one unit of
    /// work is still allowed and folds into an update.
    pub fn insert<E: Entity>(&mut self, entity: &E) -> WaybillResult<()> {
        let schema = E::schema();
        let id = entity.id();
        let state = row::to_row(entity)?;

        if self.changes.get(E::NAME, id).is_none() {
            self.ensure_not_retired(E::NAME, id)?;
        }
        LiveTable::new(&self.tx, &schema)?.insert(id, &state)?;
        self.changes.record_insert(&schema, id, state)?;
        debug!(entity = E::NAME, %id, "Inserted");
        Ok(())
    }

    fn ensure_not_retired(&self, entity: &str, id: Uuid) -> WaybillResult<()> {
        let Some(schema) = self.registry.get(entity) else {
            return Ok(());
        };
        let latest = SqliteHistoryStore::new(self.conn(), schema).latest(id)?;
        if latest.as_ref().is_some_and(HistoryRecord::is_tombstone) {
            return Err(WaybillError::integrity(format!(
                "{} {} was deleted and cannot be created again",
                entity, id
            )));
        }
        Ok(())
    }

    /// Overwrite a live entity with `entity`.
    ///
    /// Returns `false` when no column changed, in which case nothing is
    /// written. Fails with `NotFound` when the entity is not live.
    pub fn update<E: Entity>(&mut self, entity: &E) -> WaybillResult<bool> {
        let schema = E::schema();
        let id = entity.id();
        let table = LiveTable::new(&self.tx, &schema)?;
        let current = table
            .get(id)?
            .ok_or_else(|| WaybillError::not_found(E::NAME, id))?;

        let state = row::to_row(entity)?;
        let changed = diff_columns(&schema, &current, &state)?;
        if changed.is_empty() {
            debug!(entity = E::NAME, %id, "Update without changes skipped");
            return Ok(false);
        }

        table.update(id, &state, &changed)?;
        debug!(entity = E::NAME, %id, columns = ?changed, "Updated");
        self.changes.record_update(&schema, id, state, changed)?;
        Ok(true)
    }

    /// Remove a live entity, returning its last state.
    pub fn delete<E: Entity>(&mut self, id: Uuid) -> WaybillResult<Option<E>> {
        let schema = E::schema();
        let table = LiveTable::new(&self.tx, &schema)?;
        let Some(last) = table.get(id)? else {
            return Ok(None);
        };

        table.delete(id)?;
        let entity = row::from_row(last.clone())?;
        self.changes.record_delete(&schema, id, last)?;
        debug!(entity = E::NAME, %id, "Deleted");
        Ok(Some(entity))
    }

    /// Register a hook to run before commit.
    ///
    /// Returns `false` if a hook with the same name is already attached.
    pub fn attach(&mut self, hook: Arc<dyn FlushHook>) -> bool {
        if self.hooks.iter().any(|h| h.name() == hook.name()) {
            debug!(hook = hook.name(), "Hook already attached");
            return false;
        }
        self.hooks.push(hook);
        true
    }

    /// Names of the attached hooks, in run order.
    pub fn hooks(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    /// Net pending changes.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Id shared by every history record this unit of work produces.
    ///
    /// Allocated on first use; a unit of work that never asks and touches no
    /// versioned entity does not consume an id.
    pub fn transaction_id(&mut self) -> WaybillResult<i64> {
        allocate(&mut self.transaction_id, &self.sequencer, &self.tx)
    }

    /// History of a versioned type as seen from inside this transaction.
    pub fn history<E: Versioned>(&self) -> WaybillResult<SqliteHistoryStore<&Connection>> {
        let schema = self.registry.require(E::NAME)?;
        Ok(SqliteHistoryStore::new(self.conn(), schema))
    }

    /// Run the hooks, append queued history and commit.
    ///
    /// Returns the transaction id if one was allocated.
    pub(crate) fn commit(self) -> WaybillResult<Option<i64>> {
        let UnitOfWork {
            tx,
            registry,
            sequencer,
            changes,
            hooks,
            mut transaction_id,
        } = self;

        let mut queued: Vec<HistoryRecord> = Vec::new();
        for hook in &hooks {
            let mut ctx =
                FlushContext::new(&tx, &changes, &sequencer, &mut transaction_id, &mut queued);
            hook.before_flush(&mut ctx)?;
        }

        for record in &queued {
            let schema = registry.require(&record.entity_type)?;
            SqliteHistoryStore::new(&*tx, schema).append(record)?;
        }

        tx.commit()?;

        if !changes.is_empty() {
            info!(
                transaction_id = ?transaction_id,
                changes = changes.len(),
                history_records = queued.len(),
                "Unit of work committed"
            );
        }
        Ok(transaction_id)
    }
}
