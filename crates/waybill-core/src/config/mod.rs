//! Configuration system for waybill.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{WaybillError, WaybillResult};

/// Path value selecting a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Where transaction ids are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    /// A counter row inside the database, advanced by each unit of work.
    #[default]
    Table,
    /// A process-local counter seeded from the highest committed id.
    Memory,
}

/// Retry budget for units of work that hit a version conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
    /// Backoff multiplier.
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 10,
            max_delay_ms: 200,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that surfaces the first conflict.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Main waybill configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaybillConfig {
    /// SQLite database file, or `:memory:`.
    pub database_path: PathBuf,
    /// How long a writer waits for the database lock before giving up.
    pub busy_timeout_ms: u64,
    /// Retry budget for conflicting units of work.
    pub retry: RetryPolicy,
    /// Transaction id allocation.
    pub transaction_ids: SequenceKind,
}

impl Default for WaybillConfig {
    fn default() -> Self {
        let waybill_dir = dirs::home_dir()
            .map(|h| h.join(".waybill"))
            .unwrap_or_else(|| PathBuf::from(".waybill"));

        Self {
            database_path: waybill_dir.join("waybill.db"),
            busy_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
            transaction_ids: SequenceKind::Table,
        }
    }
}

impl WaybillConfig {
    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database_path: PathBuf::from(IN_MEMORY),
            ..Self::default()
        }
    }

    /// Whether the database lives in memory only.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> WaybillResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| WaybillError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| WaybillError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| WaybillError::Configuration(e.to_string())),
            _ => Err(WaybillError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> WaybillResult<Self> {
        Self::default().with_env()
    }

    /// Override fields from environment variables.
    pub fn with_env(mut self) -> WaybillResult<Self> {
        if let Ok(path) = std::env::var("WAYBILL_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(timeout) = std::env::var("WAYBILL_BUSY_TIMEOUT_MS") {
            self.busy_timeout_ms = parse_env("WAYBILL_BUSY_TIMEOUT_MS", &timeout)?;
        }
        if let Ok(retries) = std::env::var("WAYBILL_MAX_RETRIES") {
            self.retry.max_retries = parse_env("WAYBILL_MAX_RETRIES", &retries)?;
        }
        if let Ok(kind) = std::env::var("WAYBILL_TRANSACTION_IDS") {
            self.transaction_ids = match kind.to_lowercase().as_str() {
                "table" => SequenceKind::Table,
                "memory" => SequenceKind::Memory,
                other => {
                    return Err(WaybillError::Configuration(format!(
                        "WAYBILL_TRANSACTION_IDS must be 'table' or 'memory', got '{}'",
                        other
                    )))
                }
            };
        }
        Ok(self)
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> WaybillConfigBuilder {
        WaybillConfigBuilder::default()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> WaybillResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| WaybillError::Configuration(format!("{} is invalid: {}", name, e)))
}

/// Builder for WaybillConfig.
#[derive(Default)]
pub struct WaybillConfigBuilder {
    config: WaybillConfig,
}

impl WaybillConfigBuilder {
    /// Set database path.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = path.into();
        self
    }

    /// Use a private in-memory database.
    pub fn in_memory(mut self) -> Self {
        self.config.database_path = PathBuf::from(IN_MEMORY);
        self
    }

    /// Set lock wait timeout.
    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.busy_timeout_ms = ms;
        self
    }

    /// Set retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set transaction id allocation.
    pub fn transaction_ids(mut self, kind: SequenceKind) -> Self {
        self.config.transaction_ids = kind;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> WaybillConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WaybillConfig::default();
        assert!(config.database_path.ends_with(".waybill/waybill.db"));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.transaction_ids, SequenceKind::Table);
        assert!(!config.is_in_memory());
        assert!(WaybillConfig::in_memory().is_in_memory());
    }

    #[test]
    fn test_builder() {
        let config = WaybillConfig::builder()
            .in_memory()
            .busy_timeout_ms(50)
            .retry(RetryPolicy::none())
            .transaction_ids(SequenceKind::Memory)
            .build();

        assert!(config.is_in_memory());
        assert_eq!(config.busy_timeout(), Duration::from_millis(50));
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.transaction_ids, SequenceKind::Memory);
    }

    #[test]
    fn test_from_toml_file_with_partial_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "database_path = \"/tmp/orders.db\"\ntransaction_ids = \"memory\"\n\n[retry]\nmax_retries = 7"
        )
        .unwrap();

        let config = WaybillConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/orders.db"));
        assert_eq!(config.transaction_ids, SequenceKind::Memory);
        assert_eq!(config.retry.max_retries, 7);
        assert_eq!(config.retry.initial_delay_ms, 10);
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_from_yaml_and_json_files() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "busy_timeout_ms: 250").unwrap();
        assert_eq!(WaybillConfig::from_file(yaml.path()).unwrap().busy_timeout_ms, 250);

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(json, "{{\"database_path\": \":memory:\"}}").unwrap();
        assert!(WaybillConfig::from_file(json.path()).unwrap().is_in_memory());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = WaybillConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, WaybillError::Configuration(_)));
    }
}
