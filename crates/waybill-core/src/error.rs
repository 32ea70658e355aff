//! Error types for waybill operations.
//!
//! Errors carry a structured code for programmatic handling. Storage failures
//! coming out of SQLite are classified so that version collisions and lock
//! contention surface as retryable conflicts.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for waybill operations.
pub type WaybillResult<T> = Result<T, WaybillError>;

/// Main error type for all waybill operations.
#[derive(Error, Debug)]
pub enum WaybillError {
    /// A versioned type could not be registered.
    #[error("Schema error: {message}")]
    Schema {
        message: String,
        code: ErrorCode,
        entity: Option<String>,
    },

    /// Version assignment collided with a concurrent writer.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Underlying persistence failure.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Live entity not found.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        entity: String,
        id: Option<String>,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Schema (SCHEMA_xxx)
    SchemaMissingKey,
    SchemaInvalidKey,
    SchemaNotRegistered,

    // Conflict (CONFLICT_xxx)
    ConflictVersion,
    ConflictBusy,
    ConflictIntegrity,

    // Storage (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,
    DbAppendOnly,

    // Not found (NF_xxx)
    EntityNotFound,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,

    // Parse (PARSE_xxx)
    ParseInvalidValue,
    ParseInvalidJson,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SchemaMissingKey => "SCHEMA_001",
            ErrorCode::SchemaInvalidKey => "SCHEMA_002",
            ErrorCode::SchemaNotRegistered => "SCHEMA_003",
            ErrorCode::ConflictVersion => "CONFLICT_001",
            ErrorCode::ConflictBusy => "CONFLICT_002",
            ErrorCode::ConflictIntegrity => "CONFLICT_003",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::DbAppendOnly => "DB_003",
            ErrorCode::EntityNotFound => "NF_001",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ParseInvalidValue => "PARSE_001",
            ErrorCode::ParseInvalidJson => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl WaybillError {
    /// Create a schema error for an entity type.
    pub fn schema(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            code: ErrorCode::SchemaInvalidKey,
            entity: Some(entity.into()),
        }
    }

    /// Create a schema error for a type declared without an identity key.
    pub fn missing_key(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::Schema {
            message: format!("versioned type '{}' has no stable identity key", entity),
            code: ErrorCode::SchemaMissingKey,
            entity: Some(entity),
        }
    }

    /// Create a schema error for a type that was never registered.
    pub fn not_registered(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self::Schema {
            message: format!("type '{}' is not registered as versioned", entity),
            code: ErrorCode::SchemaNotRegistered,
            entity: Some(entity),
        }
    }

    /// Create a version conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            code: ErrorCode::ConflictVersion,
            source: None,
        }
    }

    /// Create a conflict with stored state that retrying cannot resolve,
    /// such as a dangling or duplicate reference.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            code: ErrorCode::ConflictIntegrity,
            source: None,
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a not found error for a live entity.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        let entity = entity.into();
        let id = id.to_string();
        Self::NotFound {
            message: format!("{} with id '{}' not found", entity, id),
            code: ErrorCode::EntityNotFound,
            entity,
            id: Some(id),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
        }
    }

    /// Create a validation error pointing at a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        let mut details = HashMap::new();
        details.insert(field.clone(), message.clone());
        Self::Validation {
            message: format!("{}: {}", field, message),
            code: ErrorCode::ValInvalidInput,
            details,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidValue,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Schema { code, .. } => *code,
            Self::Conflict { code, .. } => *code,
            Self::Storage { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether retrying the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict {
                code: ErrorCode::ConflictVersion | ErrorCode::ConflictBusy,
                ..
            }
        )
    }

    /// Whether this is a live-entity lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for WaybillError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ffi;

        if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
            match failure.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    return Self::Conflict {
                        message: err.to_string(),
                        code: ErrorCode::ConflictBusy,
                        source: Some(Box::new(err)),
                    };
                }
                rusqlite::ErrorCode::ConstraintViolation
                    if (failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                        || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
                        && err.to_string().contains("_history.") =>
                {
                    return Self::Conflict {
                        message: err.to_string(),
                        code: ErrorCode::ConflictVersion,
                        source: Some(Box::new(err)),
                    };
                }
                rusqlite::ErrorCode::ConstraintViolation
                    if err.to_string().contains("append-only") =>
                {
                    return Self::Storage {
                        message: err.to_string(),
                        code: ErrorCode::DbAppendOnly,
                        source: Some(Box::new(err)),
                    };
                }
                _ => {}
            }
        }

        Self::Storage {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
