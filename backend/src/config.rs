//! Process configuration loaded from environment variables, and the
//! repository configuration file it points at.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{AppError, Result};
use crate::models::proxy_connector::{NetworkProxy, ProxyConnectorConfig};
use crate::models::repository::{ManagedRepository, RemoteRepository};
use crate::policies::UrlFailureCache;
use crate::services::event_bus::{properties, ConfigurationEvent, EventBus};
use crate::telemetry::LogFormat;
use crate::transfer::TransferSettings;

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository configuration file (TOML or YAML)
    pub proxy_config_path: PathBuf,

    /// Log level for this crate; `RUST_LOG` takes precedence
    pub log_level: Option<String>,

    pub log_format: LogFormat,

    /// Default remote transfer timeout in seconds
    pub http_timeout_secs: u64,

    /// User-Agent sent to remote repositories
    pub user_agent: String,

    /// How long a failed URL stays in the negative cache
    pub failure_cache_ttl_secs: u64,

    /// Maximum entries in the negative cache
    pub failure_cache_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_path(None)
    }

    /// Load configuration from environment variables, with `config_path`
    /// taking precedence over `PROXY_CONFIG_PATH`.
    pub fn from_env_with_path(config_path: Option<PathBuf>) -> Result<Self> {
        let proxy_config_path = match config_path {
            Some(path) => path,
            None => env::var("PROXY_CONFIG_PATH")
                .map(PathBuf::from)
                .map_err(|_| AppError::Config("PROXY_CONFIG_PATH not set".into()))?,
        };
        Ok(Self {
            proxy_config_path,
            log_level: env::var("LOG_LEVEL").ok(),
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_default()
                .parse()
                .map_err(AppError::Config)?,
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
            user_agent: env::var("PROXY_USER_AGENT")
                .unwrap_or_else(|_| TransferSettings::default().user_agent),
            failure_cache_ttl_secs: env::var("FAILURE_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3600".into())
                .parse()
                .unwrap_or(3600),
            failure_cache_capacity: env::var("FAILURE_CACHE_CAPACITY")
                .unwrap_or_else(|_| "10000".into())
                .parse()
                .unwrap_or(10000),
        })
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn failure_cache(&self) -> UrlFailureCache {
        UrlFailureCache::new(
            self.failure_cache_capacity,
            Duration::from_secs(self.failure_cache_ttl_secs),
        )
    }
}

/// Repositories, connectors and network proxies as written in the
/// configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfiguration {
    pub managed_repositories: Vec<ManagedRepository>,
    pub remote_repositories: Vec<RemoteRepository>,
    pub proxy_connectors: Vec<ProxyConnectorConfig>,
    pub network_proxies: Vec<NetworkProxy>,
}

impl RepositoryConfiguration {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read a configuration file; `.yaml`/`.yml` are parsed as YAML,
    /// anything else as TOML.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Config(format!(
                "Failed to read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        let config = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject duplicate repository and proxy ids.
    pub fn validate(&self) -> Result<()> {
        fn unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
            let mut seen = std::collections::HashSet::new();
            for id in ids {
                if !seen.insert(id) {
                    return Err(AppError::Config(format!("Duplicate {} id '{}'", kind, id)));
                }
            }
            Ok(())
        }

        unique(
            "repository",
            self.managed_repositories
                .iter()
                .map(|r| r.id.as_str())
                .chain(self.remote_repositories.iter().map(|r| r.id.as_str())),
        )?;
        unique(
            "network proxy",
            self.network_proxies.iter().map(|p| p.id.as_str()),
        )
    }
}

/// Immutable, indexed view of one configuration generation.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationSnapshot {
    config: RepositoryConfiguration,
    managed: HashMap<String, usize>,
    remote: HashMap<String, usize>,
}

impl ConfigurationSnapshot {
    pub fn new(config: RepositoryConfiguration) -> Self {
        let managed = config
            .managed_repositories
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        let remote = config
            .remote_repositories
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        Self {
            config,
            managed,
            remote,
        }
    }

    pub fn configuration(&self) -> &RepositoryConfiguration {
        &self.config
    }

    pub fn managed_repository(&self, id: &str) -> Option<&ManagedRepository> {
        self.managed
            .get(id)
            .map(|&i| &self.config.managed_repositories[i])
    }

    pub fn remote_repository(&self, id: &str) -> Option<&RemoteRepository> {
        self.remote
            .get(id)
            .map(|&i| &self.config.remote_repositories[i])
    }

    pub fn managed_repositories(&self) -> &[ManagedRepository] {
        &self.config.managed_repositories
    }

    pub fn proxy_connectors(&self) -> &[ProxyConnectorConfig] {
        &self.config.proxy_connectors
    }

    pub fn network_proxies(&self) -> &[NetworkProxy] {
        &self.config.network_proxies
    }
}

/// Holds the current configuration and announces every replacement.
pub struct ConfigurationStore {
    current: RwLock<Arc<ConfigurationSnapshot>>,
    bus: EventBus,
}

impl ConfigurationStore {
    pub fn new(config: RepositoryConfiguration) -> Self {
        Self {
            current: RwLock::new(Arc::new(ConfigurationSnapshot::new(config))),
            bus: EventBus::new(64),
        }
    }

    pub fn snapshot(&self) -> Arc<ConfigurationSnapshot> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigurationEvent> {
        self.bus.subscribe()
    }

    /// Swap in a new configuration and publish `property` as changed.
    pub fn update(
        &self,
        property: &str,
        config: RepositoryConfiguration,
    ) -> Result<Arc<ConfigurationSnapshot>> {
        config.validate()?;
        let snapshot = Arc::new(ConfigurationSnapshot::new(config));
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();
        tracing::info!(property = %property, "Configuration updated");
        self.bus.emit(property, snapshot.clone());
        Ok(snapshot)
    }

    /// Re-read a configuration file and publish it as a whole-configuration
    /// change.
    pub async fn reload(&self, path: &Path) -> Result<Arc<ConfigurationSnapshot>> {
        let config = RepositoryConfiguration::load(path).await?;
        self.update(properties::CONFIGURATION, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::repository::LayoutType;
    use tempfile::TempDir;

    const TOML_CONFIG: &str = r#"
[[managed_repositories]]
id = "internal"
location = "/srv/repo/internal"

[[remote_repositories]]
id = "central"
url = "https://repo1.maven.org/maven2"

[[remote_repositories]]
id = "old"
url = "http://legacy.example.com/repo"
layout = "legacy"

[[proxy_connectors]]
source_repo_id = "internal"
target_repo_id = "central"
order = 1
proxy_id = "corp"
white_list_patterns = ["org/**"]

[proxy_connectors.policies]
checksum = "fail"

[[network_proxies]]
id = "corp"
host = "proxy.corp.example"
port = 3128
"#;

    // -----------------------------------------------------------------------
    // Repository configuration
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_toml_configuration() {
        let config = RepositoryConfiguration::from_toml_str(TOML_CONFIG).unwrap();
        assert_eq!(config.managed_repositories.len(), 1);
        assert_eq!(config.remote_repositories[1].layout, LayoutType::Legacy);

        let connector = &config.proxy_connectors[0];
        assert_eq!(connector.order, 1);
        assert_eq!(connector.policies.checksum, "fail");
        assert_eq!(connector.policies.releases, "always");
        assert_eq!(connector.white_list_patterns, vec!["org/**"]);
        assert_eq!(config.network_proxies[0].port, 3128);
    }

    #[test]
    fn test_parse_yaml_configuration() {
        let config = RepositoryConfiguration::from_yaml_str(
            r#"
managed_repositories:
  - id: internal
    location: /srv/repo/internal
remote_repositories:
  - id: central
    url: https://repo1.maven.org/maven2
    timeout_secs: 10
proxy_connectors:
  - source_repo_id: internal
    target_repo_id: central
    policies:
      snapshots: daily
"#,
        )
        .unwrap();
        assert_eq!(config.remote_repositories[0].timeout_secs, Some(10));
        assert_eq!(config.proxy_connectors[0].policies.snapshots, "daily");
        assert_eq!(config.proxy_connectors[0].policies.checksum, "fix");
        assert!(config.network_proxies.is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let config = RepositoryConfiguration::from_toml_str(
            r#"
[[managed_repositories]]
id = "dup"
location = "/a"

[[remote_repositories]]
id = "dup"
url = "http://example.com"
"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_load_by_extension() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("proxy.toml");
        std::fs::write(&toml_path, TOML_CONFIG).unwrap();
        let config = RepositoryConfiguration::load(&toml_path).await.unwrap();
        assert_eq!(config.proxy_connectors.len(), 1);

        let yaml_path = dir.path().join("proxy.yml");
        std::fs::write(&yaml_path, "managed_repositories: []\n").unwrap();
        let config = RepositoryConfiguration::load(&yaml_path).await.unwrap();
        assert!(config.managed_repositories.is_empty());

        let missing = RepositoryConfiguration::load(&dir.path().join("absent.toml")).await;
        assert!(matches!(missing, Err(AppError::Config(_))));
    }

    // -----------------------------------------------------------------------
    // Snapshot and store
    // -----------------------------------------------------------------------

    #[test]
    fn test_snapshot_lookups() {
        let snapshot =
            ConfigurationSnapshot::new(RepositoryConfiguration::from_toml_str(TOML_CONFIG).unwrap());
        assert!(snapshot.managed_repository("internal").is_some());
        assert!(snapshot.managed_repository("central").is_none());
        assert_eq!(
            snapshot.remote_repository("central").unwrap().url,
            "https://repo1.maven.org/maven2"
        );
        assert_eq!(snapshot.network_proxies()[0].id, "corp");
    }

    #[tokio::test]
    async fn test_store_update_publishes() {
        let store = ConfigurationStore::new(RepositoryConfiguration::default());
        let mut rx = store.subscribe();
        assert!(store.snapshot().proxy_connectors().is_empty());

        let config = RepositoryConfiguration::from_toml_str(TOML_CONFIG).unwrap();
        store.update(properties::PROXY_CONNECTORS, config).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.property, properties::PROXY_CONNECTORS);
        assert_eq!(event.snapshot.proxy_connectors().len(), 1);
        assert_eq!(store.snapshot().proxy_connectors().len(), 1);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config {
            proxy_config_path: PathBuf::from("proxy.toml"),
            log_level: None,
            log_format: LogFormat::Plain,
            http_timeout_secs: 15,
            user_agent: "test-agent".into(),
            failure_cache_ttl_secs: 3600,
            failure_cache_capacity: 10,
        };
        let settings = config.transfer_settings();
        assert_eq!(settings.timeout, Duration::from_secs(15));
        assert_eq!(settings.user_agent, "test-agent");
        assert!(config.failure_cache().is_empty());
    }
}
