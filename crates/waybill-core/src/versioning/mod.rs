//! Entity versioning for audit trails and point-in-time queries.
//!
//! Every committed insert, update and delete of a versioned entity appends
//! an immutable snapshot to that entity type's history table, tagged with a
//! per-entity version and the id of the unit of work that produced it.

mod interceptor;
mod record;
mod registry;
mod sequencer;
mod snapshot;
mod store;

pub use interceptor::VersioningInterceptor;
pub use record::{HistoryRecord, HistorySummary, Operation};
pub use registry::{HistorySchema, SchemaRegistry, HISTORY_COLUMNS};
pub use sequencer::{AtomicSequence, SequenceProvider, TableSequence, VersionSequencer};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use store::{HistoryStore, SqliteHistoryStore};
