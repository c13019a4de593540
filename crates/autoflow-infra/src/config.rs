//! Global configuration loader for Autoflow.
//!
//! Reads `config.toml` from the data directory (`~/.autoflow/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use autoflow_types::config::GlobalConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "AUTOFLOW_DATA_DIR";

/// Resolve the data directory: `AUTOFLOW_DATA_DIR`, else `~/.autoflow`,
/// else `./.autoflow`.
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from(std::env::var(DATA_DIR_ENV).ok(), dirs::home_dir())
}

fn data_dir_from(env_value: Option<String>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env_value.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    home.map(|h| h.join(".autoflow"))
        .unwrap_or_else(|| PathBuf::from(".autoflow"))
}

/// Upload directory from config, defaulting to `{data_dir}/uploads`.
pub fn resolve_upload_dir(config: &GlobalConfig, data_dir: &Path) -> PathBuf {
    config
        .upload_directory
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("uploads"))
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`GlobalConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.scheduler_interval_secs, 60);
        assert_eq!(config.max_workflow_executions, 1000);
        assert!(config.record_store.api_key.is_none());
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
scheduler_interval_secs = 15
max_workflow_executions = 50

[record_store]
api_key = "key123"
base_id = "appXYZ"

[server]
port = 9000
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.scheduler_interval_secs, 15);
        assert_eq!(config.max_workflow_executions, 50);
        assert_eq!(config.record_store.api_key.as_deref(), Some("key123"));
        assert_eq!(config.record_store.base_url, "https://api.airtable.com/v0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.scheduler_interval_secs, 60);
    }

    #[test]
    fn data_dir_prefers_env_then_home() {
        assert_eq!(
            data_dir_from(Some("/srv/af".to_string()), Some(PathBuf::from("/home/u"))),
            PathBuf::from("/srv/af")
        );
        assert_eq!(
            data_dir_from(Some(String::new()), Some(PathBuf::from("/home/u"))),
            PathBuf::from("/home/u/.autoflow")
        );
        assert_eq!(data_dir_from(None, None), PathBuf::from(".autoflow"));
    }

    #[test]
    fn upload_dir_defaults_under_data_dir() {
        let mut config = GlobalConfig::default();
        assert_eq!(
            resolve_upload_dir(&config, Path::new("/d")),
            PathBuf::from("/d/uploads")
        );
        config.upload_directory = Some("/mnt/uploads".to_string());
        assert_eq!(
            resolve_upload_dir(&config, Path::new("/d")),
            PathBuf::from("/mnt/uploads")
        );
    }
}
