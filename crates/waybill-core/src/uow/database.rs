//! Database handle and unit-of-work runner.

use std::sync::{Arc, Mutex, MutexGuard};

use backon::{BlockingRetryable, ExponentialBuilder};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{info, warn};

use super::UnitOfWork;
use crate::config::{RetryPolicy, SequenceKind, WaybillConfig};
use crate::entity::{Entity, EntitySchema, Versioned};
use crate::error::{WaybillError, WaybillResult};
use crate::versioning::{
    AtomicSequence, HistoryRecord, SchemaRegistry, SequenceProvider, SqliteHistoryStore,
    TableSequence, VersionSequencer, VersioningInterceptor,
};

/// SQLite database holding live tables and their history.
///
/// All access goes through one connection; units of work are serialized by
/// the connection mutex within a process and by SQLite's write lock across
/// processes.
pub struct Database {
    conn: Mutex<Connection>,
    registry: Arc<SchemaRegistry>,
    sequencer: VersionSequencer,
    interceptor: VersioningInterceptor,
    retry: RetryPolicy,
}

impl Database {
    /// Start assembling a database from a configuration.
    pub fn builder(config: WaybillConfig) -> DatabaseBuilder {
        DatabaseBuilder {
            config,
            registry: SchemaRegistry::new(),
            tables: Vec::new(),
            provider: None,
        }
    }

    fn lock(&self) -> WaybillResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| WaybillError::internal("Failed to acquire connection lock"))
    }

    /// Run `work` as one unit of work.
    ///
    /// The versioning interceptor is attached before `work` runs. Returning
    /// `Err` rolls back every live write and history record. Conflicts
    /// retry the whole closure under the configured policy.
    pub fn transaction<T, F>(&self, mut work: F) -> WaybillResult<T>
    where
        F: FnMut(&mut UnitOfWork<'_>) -> WaybillResult<T>,
    {
        let policy = &self.retry;
        (|| self.run(&mut work))
            .retry(
                ExponentialBuilder::default()
                    .with_max_times(policy.max_retries as usize)
                    .with_min_delay(policy.initial_delay())
                    .with_max_delay(policy.max_delay())
                    .with_factor(policy.multiplier),
            )
            .sleep(std::thread::sleep)
            .when(WaybillError::is_retryable)
            .notify(|err, dur| {
                warn!("Unit of work conflicted, retrying in {:?}: {}", dur, err);
            })
            .call()
    }

    fn run<T, F>(&self, work: &mut F) -> WaybillResult<T>
    where
        F: FnMut(&mut UnitOfWork<'_>) -> WaybillResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut uow = UnitOfWork::new(tx, self.registry.clone(), self.sequencer.clone());
        self.interceptor.attach(&mut uow);

        let value = work(&mut uow)?;
        uow.commit()?;
        Ok(value)
    }

    /// Run read-only work against a consistent view.
    ///
    /// Nothing `read` does is committed.
    pub fn read<T, F>(&self, work: F) -> WaybillResult<T>
    where
        F: FnOnce(&UnitOfWork<'_>) -> WaybillResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let uow = UnitOfWork::new(tx, self.registry.clone(), self.sequencer.clone());
        work(&uow)
    }

    /// Run `lookup` against the committed history of a versioned type.
    ///
    /// The connection is held only while `lookup` runs, so whatever it
    /// returns can be kept across later units of work. Inside a unit of work
    /// use [`UnitOfWork::history`] instead.
    pub fn with_history<E, T, F>(&self, lookup: F) -> WaybillResult<T>
    where
        E: Versioned,
        F: FnOnce(&SqliteHistoryStore<&Connection>) -> WaybillResult<T>,
    {
        let schema = self.registry.require(E::NAME)?;
        let conn = self.lock()?;
        lookup(&SqliteHistoryStore::new(&*conn, schema))
    }

    /// Every history record produced by one unit of work, across all types.
    pub fn transaction_changes(&self, transaction_id: i64) -> WaybillResult<Vec<HistoryRecord>> {
        let conn = self.lock()?;
        let mut records = Vec::new();
        for schema in self.registry.all() {
            records.extend(SqliteHistoryStore::new(&*conn, schema).in_transaction(transaction_id)?);
        }
        Ok(records)
    }

    /// Registered versioned types.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

/// Builder for [`Database`].
pub struct DatabaseBuilder {
    config: WaybillConfig,
    registry: SchemaRegistry,
    tables: Vec<EntitySchema>,
    provider: Option<Arc<dyn SequenceProvider>>,
}

impl DatabaseBuilder {
    /// Add a versioned entity type: live table plus history table.
    pub fn versioned<E: Versioned>(mut self) -> WaybillResult<Self> {
        self.registry.register::<E>()?;
        self.track(E::schema());
        Ok(self)
    }

    /// Add an entity type without history.
    pub fn entity<E: Entity>(mut self) -> Self {
        self.track(E::schema());
        self
    }

    /// Use a custom transaction id source instead of the configured one.
    pub fn sequence_provider(mut self, provider: Arc<dyn SequenceProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    fn track(&mut self, schema: EntitySchema) {
        if !self.tables.iter().any(|t| t.name == schema.name) {
            self.tables.push(schema);
        }
    }

    /// Open the connection and create any missing tables.
    pub fn open(self) -> WaybillResult<Database> {
        let config = self.config;
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = config.database_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let conn = Connection::open(&config.database_path)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn
        };
        conn.busy_timeout(config.busy_timeout())?;

        for table in &self.tables {
            let key = table
                .key_column()
                .ok_or_else(|| WaybillError::missing_key(&table.name))?;
            conn.execute_batch(&table.live_table_ddl(key))?;
        }
        for history in self.registry.all() {
            conn.execute_batch(&history.ddl())?;
        }

        // Either sequence resumes after the highest committed id, whichever
        // kind wrote the history before.
        let provider: Arc<dyn SequenceProvider> = match (self.provider, config.transaction_ids) {
            (Some(provider), _) => provider,
            (None, SequenceKind::Table) => {
                TableSequence::init_schema(&conn)?;
                let sequence = TableSequence::default();
                sequence.seed(&conn, last_transaction_id(&conn, &self.registry)?)?;
                Arc::new(sequence)
            }
            (None, SequenceKind::Memory) => Arc::new(AtomicSequence::starting_after(
                last_transaction_id(&conn, &self.registry)?,
            )),
        };

        info!(
            path = %config.database_path.display(),
            tables = self.tables.len(),
            versioned = self.registry.len(),
            "Opened database"
        );

        let registry = Arc::new(self.registry);
        let sequencer = VersionSequencer::new(provider);
        Ok(Database {
            conn: Mutex::new(conn),
            interceptor: VersioningInterceptor::new(registry.clone(), sequencer.clone()),
            registry,
            sequencer,
            retry: config.retry,
        })
    }
}

/// Highest transaction id in any history table, or 0.
fn last_transaction_id(conn: &Connection, registry: &SchemaRegistry) -> WaybillResult<i64> {
    let mut last = 0;
    for history in registry.all() {
        if let Some(max) = SqliteHistoryStore::new(conn, history).max_transaction_id()? {
            last = last.max(max);
        }
    }
    Ok(last)
}
