//! Proxy connector and network proxy models.

use serde::{Deserialize, Serialize};

use super::repository::{ManagedRepository, RemoteRepository};

/// Policy settings attached to a connector, as configured strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(default = "default_update_policy")]
    pub releases: String,
    #[serde(default = "default_update_policy")]
    pub snapshots: String,
    #[serde(default = "default_checksum_policy")]
    pub checksum: String,
    #[serde(default = "default_cache_failures_policy")]
    pub cache_failures: String,
}

fn default_update_policy() -> String {
    "always".to_string()
}

fn default_checksum_policy() -> String {
    "fix".to_string()
}

fn default_cache_failures_policy() -> String {
    "no".to_string()
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            releases: default_update_policy(),
            snapshots: default_update_policy(),
            checksum: default_checksum_policy(),
            cache_failures: default_cache_failures_policy(),
        }
    }
}

/// Connector as it appears in the repository configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConnectorConfig {
    pub source_repo_id: String,
    pub target_repo_id: String,
    /// 1-based evaluation order; 0 means unordered (evaluated last)
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub proxy_id: Option<String>,
    #[serde(default)]
    pub policies: PolicySettings,
    #[serde(default)]
    pub white_list_patterns: Vec<String>,
    #[serde(default)]
    pub black_list_patterns: Vec<String>,
}

/// HTTP proxy used to reach a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProxy {
    pub id: String,
    #[serde(default = "default_proxy_protocol")]
    pub protocol: String,
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_proxy_protocol() -> String {
    "http".to_string()
}

fn default_proxy_port() -> u16 {
    8080
}

impl NetworkProxy {
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// A connector resolved against the configured repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyConnector {
    pub source: ManagedRepository,
    pub target: RemoteRepository,
    pub order: u32,
    pub proxy_id: Option<String>,
    /// Network proxy named by `proxy_id`, resolved with the same
    /// configuration generation as the repositories.
    pub network_proxy: Option<NetworkProxy>,
    pub policies: PolicySettings,
    pub white_list: Vec<String>,
    pub black_list: Vec<String>,
}

impl ProxyConnector {
    pub fn source_repo_id(&self) -> &str {
        &self.source.id
    }

    pub fn target_repo_id(&self) -> &str {
        &self.target.id
    }

    /// Policy string that governs a pre-fetch decision.
    pub fn update_policy(&self, snapshot: bool) -> &str {
        if snapshot {
            &self.policies.snapshots
        } else {
            &self.policies.releases
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults_from_empty_toml() {
        let cfg: ProxyConnectorConfig = toml::from_str(
            r#"
            source_repo_id = "internal"
            target_repo_id = "central"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.order, 0);
        assert_eq!(cfg.policies, PolicySettings::default());
        assert_eq!(cfg.policies.checksum, "fix");
        assert!(cfg.white_list_patterns.is_empty());
    }

    #[test]
    fn test_network_proxy_url() {
        let proxy: NetworkProxy = toml::from_str(
            r#"
            id = "corp"
            host = "proxy.corp.example"
            "#,
        )
        .unwrap();
        assert_eq!(proxy.url(), "http://proxy.corp.example:8080");
    }
}
