//! Audit and timestamp fields shared by every entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation and modification bookkeeping embedded in each entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// When the entity was created.
    pub created_at: DateTime<Utc>,
    /// When the entity was last modified.
    pub updated_at: DateTime<Utc>,
    /// Identity of the creator.
    pub created_by: String,
    /// Identity of the last modifier.
    #[serde(default)]
    pub updated_by: Option<String>,
}

impl Metadata {
    /// Metadata for a freshly created entity; the creator is also the last modifier.
    pub fn new(created_by: impl Into<String>) -> Self {
        let now = Utc::now();
        let created_by = created_by.into();
        Self {
            created_at: now,
            updated_at: now,
            updated_by: Some(created_by.clone()),
            created_by,
        }
    }

    /// Record a modification by `actor`.
    pub fn touch(&mut self, actor: impl Into<String>) {
        self.updated_at = Utc::now();
        self.updated_by = Some(actor.into());
    }
}
