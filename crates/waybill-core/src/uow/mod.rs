//! Units of work over the SQLite store.
//!
//! A [`Database`] hands out one [`UnitOfWork`] per transaction. Each unit of
//! work tracks its net [`ChangeSet`] and runs its [`FlushHook`]s before
//! commit; history capture is one such hook, attached to every unit of work
//! by [`Database::transaction`].

mod change;
mod database;
mod hook;
mod live;
mod unit_of_work;

pub use change::{ChangeKind, ChangeSet, PendingChange};
pub use database::{Database, DatabaseBuilder};
pub use hook::{FlushContext, FlushHook};
pub use live::LiveTable;
pub use unit_of_work::UnitOfWork;
