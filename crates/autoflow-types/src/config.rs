//! Global configuration types for Autoflow.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! scheduler cadence, execution retention, file limits, the record-store
//! client, and the HTTP bind address.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the engine.
///
/// Loaded from `~/.autoflow/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Seconds between scheduler ticks (trigger detection and retention).
    #[serde(default = "default_scheduler_interval_secs")]
    pub scheduler_interval_secs: u64,

    /// Terminal executions retained per workflow.
    #[serde(default = "default_max_workflow_executions")]
    pub max_workflow_executions: u32,

    /// Declared per-execution timeout. Reported, not enforced.
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,

    /// Upload directory; `None` means `{data_dir}/uploads`.
    #[serde(default)]
    pub upload_directory: Option<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default)]
    pub record_store: RecordStoreConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_scheduler_interval_secs() -> u64 {
    60
}

fn default_max_workflow_executions() -> u32 {
    1000
}

fn default_execution_timeout_secs() -> u64 {
    3600
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    [".pdf", ".doc", ".docx", ".txt", ".csv", ".xlsx", ".xls"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            scheduler_interval_secs: default_scheduler_interval_secs(),
            max_workflow_executions: default_max_workflow_executions(),
            execution_timeout_secs: default_execution_timeout_secs(),
            upload_directory: None,
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
            record_store: RecordStoreConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Credentials for the tabular record store. Without both `api_key` and
/// `base_id` the client runs in dry-run mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStoreConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_id: Option<String>,
    #[serde(default = "default_record_store_url")]
    pub base_url: String,
}

fn default_record_store_url() -> String {
    "https://api.airtable.com/v0".to_string()
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_id: None,
            base_url: default_record_store_url(),
        }
    }
}

/// HTTP bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8006
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.scheduler_interval_secs, 60);
        assert_eq!(config.max_workflow_executions, 1000);
        assert_eq!(config.execution_timeout_secs, 3600);
        assert_eq!(config.server.port, 8006);
        assert!(config.record_store.api_key.is_none());
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.scheduler_interval_secs, 60);
        assert_eq!(config.allowed_extensions.len(), 7);
        assert_eq!(config.record_store.base_url, "https://api.airtable.com/v0");
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
scheduler_interval_secs = 15
max_workflow_executions = 50

[record_store]
api_key = "key123"
base_id = "app456"

[server]
port = 9000
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler_interval_secs, 15);
        assert_eq!(config.max_workflow_executions, 50);
        assert_eq!(config.record_store.api_key.as_deref(), Some("key123"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
