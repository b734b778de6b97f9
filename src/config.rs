//! Service configuration
//!
//! Loaded from a JSON file (explicit `--config` path or the XDG config dir),
//! with every field defaulting so a missing or partial file still yields a
//! runnable configuration. The rule-set file locations mirror the historical
//! deployment layout under `/etc`.

use crate::core::applier::RulesetPaths;
use crate::core::gate::TransitionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP surface binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// How long the transition-to-maintenance window is held before the
    /// deferred finalizer completes the move (default: 5 minutes)
    #[serde(default = "default_transition_duration_secs")]
    pub transition_duration_secs: u64,

    /// Rule-set file applied for maintenance mode
    #[serde(default = "default_maintenance_ruleset")]
    pub maintenance_ruleset: PathBuf,

    /// Rule-set file applied for production mode
    #[serde(default = "default_production_ruleset")]
    pub production_ruleset: PathBuf,

    /// Rule-set file applied for the transition window
    #[serde(default = "default_transition_ruleset")]
    pub transition_ruleset: PathBuf,

    /// Run `nft --check` against all three rule-sets before serving
    #[serde(default = "default_true")]
    pub check_rulesets_on_start: bool,

    /// Write a JSON-lines audit trail of transitions under the state dir
    #[serde(default = "default_true")]
    pub enable_audit_log: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            transition_duration_secs: default_transition_duration_secs(),
            maintenance_ruleset: default_maintenance_ruleset(),
            production_ruleset: default_production_ruleset(),
            transition_ruleset: default_transition_ruleset(),
            check_rulesets_on_start: true,
            enable_audit_log: true,
        }
    }
}

impl ServiceConfig {
    /// Rule-set paths in the shape the applier consumes
    pub fn ruleset_paths(&self) -> RulesetPaths {
        RulesetPaths {
            maintenance: self.maintenance_ruleset.clone(),
            production: self.production_ruleset.clone(),
            transition: self.transition_ruleset.clone(),
        }
    }

    /// Transition timing in the shape the gate consumes
    pub fn transition_config(&self) -> TransitionConfig {
        TransitionConfig {
            transition_duration: Duration::from_secs(self.transition_duration_secs),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3535".to_string()
}

fn default_transition_duration_secs() -> u64 {
    300
}

fn default_maintenance_ruleset() -> PathBuf {
    PathBuf::from("/etc/nftables-maintenance.conf")
}

fn default_production_ruleset() -> PathBuf {
    PathBuf::from("/etc/nftables-production.conf")
}

fn default_transition_ruleset() -> PathBuf {
    PathBuf::from("/etc/nftables-transition.conf")
}

fn default_true() -> bool {
    true
}

/// Resolves the default config file location under the XDG config dir
fn default_config_path() -> Option<PathBuf> {
    crate::utils::get_config_dir().map(|mut dir| {
        dir.push("config.json");
        dir
    })
}

/// Loads the service config from `path`, or from the default location when
/// `path` is `None`. Missing or unreadable files fall back to defaults; a
/// present-but-invalid file is an error so a typo never silently reverts the
/// daemon to defaults.
///
/// # Errors
///
/// Returns `Err` if an existing config file cannot be parsed.
pub async fn load_config(path: Option<&Path>) -> std::io::Result<ServiceConfig> {
    let resolved = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(ServiceConfig::default()),
        },
    };

    match tokio::fs::read_to_string(&resolved).await {
        Ok(json) => serde_json::from_str(&json).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid config file {}: {e}", resolved.display()),
            )
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServiceConfig::default()),
        Err(e) => Err(e),
    }
}

/// Saves the service config using an atomic write pattern:
/// 1. Writes to a temporary file.
/// 2. Sets restrictive permissions (0o600).
/// 3. Atomically renames to the target path.
///
/// # Errors
///
/// Returns `Err` on any I/O failure; a partially written config file is
/// never left at the target path.
pub async fn save_config(config: &ServiceConfig, path: Option<&Path>) -> std::io::Result<PathBuf> {
    let target = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "config directory not found")
        })?,
    };

    let json = serde_json::to_string_pretty(config)?;

    let mut temp_path = target.clone();
    temp_path.set_extension("json.tmp");

    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600) // Set permissions before any data is written
            .open(&temp_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(&temp_path, &target).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_historical_layout() {
        let config = ServiceConfig::default();
        assert_eq!(config.transition_duration_secs, 300);
        assert_eq!(
            config.maintenance_ruleset,
            PathBuf::from("/etc/nftables-maintenance.conf")
        );
        assert!(config.check_rulesets_on_start);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{ "transition_duration_secs": 5 }"#).unwrap();
        assert_eq!(config.transition_duration_secs, 5);
        assert_eq!(config.listen_addr, "127.0.0.1:3535");
        assert!(config.enable_audit_log);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("fwgate-config-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("config.json");

        let config = ServiceConfig {
            listen_addr: "0.0.0.0:9999".to_string(),
            transition_duration_secs: 42,
            ..ServiceConfig::default()
        };

        save_config(&config, Some(&path)).await.unwrap();
        let loaded = load_config(Some(&path)).await.unwrap();

        assert_eq!(loaded.listen_addr, "0.0.0.0:9999");
        assert_eq!(loaded.transition_duration_secs, 42);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("fwgate-does-not-exist.json");
        let config = load_config(Some(&path)).await.unwrap();
        assert_eq!(config.transition_duration_secs, 300);
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("fwgate-config-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("config.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        assert!(load_config(Some(&path)).await.is_err());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
