//! Entity declarations.
//!
//! An entity is a serde type with a UUID identity and an embedded
//! [`Metadata`] value. Types whose changes must be captured in history also
//! implement the [`Versioned`] marker and are registered with the
//! [`SchemaRegistry`](crate::versioning::SchemaRegistry).

mod metadata;
pub mod row;
mod schema;

pub use metadata::Metadata;
pub use row::Row;
pub use schema::{Column, ColumnType, EntitySchema};

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// A record stored in a live table.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Entity type name.
    const NAME: &'static str;

    /// Table description for this entity.
    fn schema() -> EntitySchema;

    /// Stable identity of this record.
    fn id(&self) -> Uuid;

    /// Audit and timestamp fields.
    fn metadata(&self) -> &Metadata;

    /// Mutable audit and timestamp fields.
    fn metadata_mut(&mut self) -> &mut Metadata;
}

/// Marker for entities whose every committed state is kept in history.
pub trait Versioned: Entity {}
