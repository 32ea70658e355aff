//! Pending change tracking for a unit of work.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::entity::{EntitySchema, Row};
use crate::error::{WaybillError, WaybillResult};
use crate::versioning::Operation;

/// How a pending entity differs from its state at the start of the unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created in this unit of work.
    New,
    /// Existed before and some columns changed.
    Dirty { changed: BTreeSet<String> },
    /// Existed before and was removed.
    Deleted,
}

/// One entity touched by a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub kind: ChangeKind,
    /// State after the change, or the last live state for deletions.
    pub state: Row,
}

impl PendingChange {
    /// Operation a history record of this change carries.
    pub fn operation(&self) -> Operation {
        match self.kind {
            ChangeKind::New => Operation::Insert,
            ChangeKind::Dirty { .. } => Operation::Update,
            ChangeKind::Deleted => Operation::Delete,
        }
    }

    /// Columns changed by an update; empty for other kinds.
    pub fn changed_columns(&self) -> Vec<&str> {
        match &self.kind {
            ChangeKind::Dirty { changed } => changed.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// Net changes of a unit of work, one entry per entity.
///
/// Consecutive operations on the same entity are folded so the set always
/// describes the difference between the state before the unit of work and
/// the state it will commit.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    entries: Vec<PendingChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, entity_type: &str, entity_id: Uuid) -> Option<usize> {
        self.entries
            .iter()
            .position(|c| c.entity_type == entity_type && c.entity_id == entity_id)
    }

    /// Pending change of one entity, if any.
    pub fn get(&self, entity_type: &str, entity_id: Uuid) -> Option<&PendingChange> {
        self.position(entity_type, entity_id).map(|i| &self.entries[i])
    }

    pub(crate) fn record_insert(
        &mut self,
        schema: &EntitySchema,
        entity_id: Uuid,
        state: Row,
    ) -> WaybillResult<()> {
        let Some(i) = self.position(&schema.name, entity_id) else {
            self.entries.push(PendingChange {
                entity_type: schema.name.clone(),
                entity_id,
                kind: ChangeKind::New,
                state,
            });
            return Ok(());
        };

        if self.entries[i].kind != ChangeKind::Deleted {
            return Err(WaybillError::validation(format!(
                "{} {} is already live in this unit of work",
                schema.name, entity_id
            )));
        }

        // Re-created after a delete: net effect is an update.
        let changed = diff_columns(schema, &self.entries[i].state, &state)?;
        if changed.is_empty() {
            self.entries.remove(i);
        } else {
            let entry = &mut self.entries[i];
            entry.kind = ChangeKind::Dirty { changed };
            entry.state = state;
        }
        Ok(())
    }

    pub(crate) fn record_update(
        &mut self,
        schema: &EntitySchema,
        entity_id: Uuid,
        state: Row,
        changed: BTreeSet<String>,
    ) -> WaybillResult<()> {
        let Some(i) = self.position(&schema.name, entity_id) else {
            self.entries.push(PendingChange {
                entity_type: schema.name.clone(),
                entity_id,
                kind: ChangeKind::Dirty { changed },
                state,
            });
            return Ok(());
        };

        let entry = &mut self.entries[i];
        match &mut entry.kind {
            ChangeKind::New => {}
            ChangeKind::Dirty { changed: previous } => previous.extend(changed),
            ChangeKind::Deleted => return Err(WaybillError::not_found(&schema.name, entity_id)),
        }
        entry.state = state;
        Ok(())
    }

    pub(crate) fn record_delete(
        &mut self,
        schema: &EntitySchema,
        entity_id: Uuid,
        last_state: Row,
    ) -> WaybillResult<()> {
        let Some(i) = self.position(&schema.name, entity_id) else {
            self.entries.push(PendingChange {
                entity_type: schema.name.clone(),
                entity_id,
                kind: ChangeKind::Deleted,
                state: last_state,
            });
            return Ok(());
        };

        let entry = &mut self.entries[i];
        match entry.kind {
            ChangeKind::Deleted => return Err(WaybillError::not_found(&schema.name, entity_id)),
            ChangeKind::Dirty { .. } => {
                entry.kind = ChangeKind::Deleted;
                entry.state = last_state;
            }
            // Never existed outside this unit of work.
            ChangeKind::New => {
                self.entries.remove(i);
            }
        }
        Ok(())
    }

    /// Entities created in this unit of work.
    pub fn new_entities(&self) -> impl Iterator<Item = &PendingChange> {
        self.entries
            .iter()
            .filter(|c| matches!(c.kind, ChangeKind::New))
    }

    /// Entities modified in this unit of work.
    pub fn dirty(&self) -> impl Iterator<Item = &PendingChange> {
        self.entries
            .iter()
            .filter(|c| matches!(c.kind, ChangeKind::Dirty { .. }))
    }

    /// Entities removed in this unit of work.
    pub fn deleted(&self) -> impl Iterator<Item = &PendingChange> {
        self.entries
            .iter()
            .filter(|c| matches!(c.kind, ChangeKind::Deleted))
    }

    /// All pending changes in the order they were first touched.
    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Business columns whose stored value differs between two states.
pub(crate) fn diff_columns(
    schema: &EntitySchema,
    before: &Row,
    after: &Row,
) -> WaybillResult<BTreeSet<String>> {
    use crate::entity::row::to_sql;

    let mut changed = BTreeSet::new();
    for column in &schema.columns {
        let old = to_sql(&column.name, column.ty, before.get(&column.name))?;
        let new = to_sql(&column.name, column.ty, after.get(&column.name))?;
        if old != new {
            changed.insert(column.name.clone());
        }
    }
    Ok(changed)
}
