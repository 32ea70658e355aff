//! Flush hook that mirrors versioned changes into history.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::{SchemaRegistry, SnapshotBuilder, VersionSequencer};
use crate::error::WaybillResult;
use crate::uow::{FlushContext, FlushHook, PendingChange, UnitOfWork};

/// Captures a history record for every pending change of a versioned type.
///
/// Records are queued into the same transaction as the live writes, so they
/// commit or roll back together. Changes to unregistered types pass through.
#[derive(Clone)]
pub struct VersioningInterceptor {
    registry: Arc<SchemaRegistry>,
    sequencer: VersionSequencer,
}

impl VersioningInterceptor {
    pub const NAME: &'static str = "versioning";

    pub fn new(registry: Arc<SchemaRegistry>, sequencer: VersionSequencer) -> Self {
        Self {
            registry,
            sequencer,
        }
    }

    /// Attach to a unit of work. Attaching twice is a no-op.
    pub fn attach(&self, uow: &mut UnitOfWork<'_>) -> bool {
        uow.attach(Arc::new(self.clone()))
    }

    fn is_versioned(&self, change: &PendingChange) -> bool {
        self.registry.is_versioned(&change.entity_type)
    }
}

impl FlushHook for VersioningInterceptor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn before_flush(&self, ctx: &mut FlushContext<'_>) -> WaybillResult<()> {
        let changes = ctx.changes();
        let inserted: Vec<_> = changes.new_entities().filter(|c| self.is_versioned(c)).collect();
        let updated: Vec<_> = changes.dirty().filter(|c| self.is_versioned(c)).collect();
        let deleted: Vec<_> = changes.deleted().filter(|c| self.is_versioned(c)).collect();

        let total = inserted.len() + updated.len() + deleted.len();
        if total == 0 {
            debug!(pending = changes.len(), "No versioned changes to capture");
            return Ok(());
        }

        let transaction_id = ctx.transaction_id()?;
        let changed_at = Utc::now();

        for change in inserted.into_iter().chain(updated).chain(deleted) {
            let schema = self.registry.require(&change.entity_type)?;
            let snapshot = SnapshotBuilder::build(
                &schema,
                change.entity_id,
                &change.state,
                change.operation(),
            )?;
            let version = self
                .sequencer
                .next_version(ctx.connection(), &schema, change.entity_id)?;

            debug!(
                entity = %change.entity_type,
                entity_id = %change.entity_id,
                version,
                operation = %change.operation(),
                changed = ?change.changed_columns(),
                "Captured snapshot"
            );
            ctx.queue(snapshot.into_record(version, transaction_id, changed_at));
        }

        debug!(transaction_id, records = total, "Queued history records");
        Ok(())
    }
}
