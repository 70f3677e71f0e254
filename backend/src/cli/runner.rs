//! Executes CLI commands against a loaded configuration.

use std::sync::Arc;

use serde::Serialize;

use super::ProxyCommand;
use crate::config::{Config, ConfigurationStore, RepositoryConfiguration};
use crate::error::{AppError, Result};
use crate::layout::{self, PathKind};
use crate::models::repository::RepositoryReference;
use crate::services::connector_resolver::ConnectorResolver;
use crate::services::metadata_service;
use crate::services::proxy_service::ProxyService;
use crate::storage::ManagedRepositoryContent;
use crate::transfer::TransferClients;

/// Everything a command needs, wired from one configuration file.
pub struct ProxyRuntime {
    pub store: Arc<ConfigurationStore>,
    pub resolver: Arc<ConnectorResolver>,
    pub service: ProxyService,
}

impl ProxyRuntime {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let repositories = RepositoryConfiguration::load(&config.proxy_config_path).await?;
        Ok(Self::new(config, repositories))
    }

    pub fn new(config: &Config, repositories: RepositoryConfiguration) -> Self {
        let store = Arc::new(ConfigurationStore::new(repositories));
        let resolver = Arc::new(ConnectorResolver::from_snapshot(&store.snapshot()));
        let clients = TransferClients::with_defaults(&config.transfer_settings());
        let service = ProxyService::new(
            resolver.clone(),
            clients,
            Arc::new(config.failure_cache()),
        );
        Self {
            store,
            resolver,
            service,
        }
    }

    fn repository(&self, id: &str) -> Result<RepositoryReference> {
        let snapshot = self.store.snapshot();
        if let Some(managed) = snapshot.managed_repository(id) {
            return Ok(managed.clone().into());
        }
        if let Some(remote) = snapshot.remote_repository(id) {
            return Ok(remote.clone().into());
        }
        Err(AppError::NotFound(format!("Repository '{}' not found", id)))
    }
}

#[derive(Debug, Serialize)]
struct FetchReport<'a> {
    repository: &'a str,
    path: &'a str,
    found: bool,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    managed_repositories: usize,
    remote_repositories: usize,
    proxy_connectors: usize,
    resolved_connectors: usize,
    network_proxies: usize,
}

fn print<T: Serialize + std::fmt::Debug>(format: &str, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if format.eq_ignore_ascii_case("json") {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

/// Run one command. Returns `false` when a fetch found nothing.
pub async fn run(runtime: &ProxyRuntime, command: &ProxyCommand, format: &str) -> Result<bool> {
    match command {
        ProxyCommand::Fetch { repository, path } => {
            let repo = runtime.repository(repository)?;
            let found = runtime.service.fetch_resource(&repo, path).await?;
            let report = FetchReport {
                repository,
                path,
                found,
            };
            print(format, &report, || {
                format!("{} {}:{}", if found { "FOUND" } else { "NOT FOUND" }, repository, path)
            })?;
            Ok(found)
        }
        ProxyCommand::Connectors { repository } => {
            let repo = runtime.repository(repository)?;
            let connectors = runtime.service.get_proxy_connectors(&repo);
            print(format, connectors.as_ref(), || {
                if connectors.is_empty() {
                    return format!("{}: no proxy connectors", repository);
                }
                connectors
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        format!(
                            "{}. {} -> {} ({}) releases={} snapshots={} checksum={} cache-failures={}",
                            i + 1,
                            c.source_repo_id(),
                            c.target_repo_id(),
                            c.target.url,
                            c.policies.releases,
                            c.policies.snapshots,
                            c.policies.checksum,
                            c.policies.cache_failures
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            Ok(true)
        }
        ProxyCommand::UpdateMetadata { repository, path } => {
            let repo = runtime.repository(repository)?;
            let managed = repo.as_managed().cloned().ok_or_else(|| {
                AppError::Validation(format!("Repository '{}' is not a managed repository", repository))
            })?;
            let content = ManagedRepositoryContent::new(managed);
            let reference = match layout::classify_path(content.layout(), path) {
                PathKind::Metadata(reference) => reference,
                _ => {
                    return Err(AppError::Validation(format!(
                        "'{}' is not a metadata path",
                        path
                    )))
                }
            };
            let metadata = metadata_service::update_metadata(&content, &reference).await?;
            print(format, &metadata, || {
                format!(
                    "Updated {} ({} versions, latest {})",
                    reference,
                    metadata.available_versions.len(),
                    metadata.latest_version.as_deref().unwrap_or("-")
                )
            })?;
            Ok(true)
        }
        ProxyCommand::CheckConfig => {
            let snapshot = runtime.store.snapshot();
            let report = ConfigReport {
                managed_repositories: snapshot.managed_repositories().len(),
                remote_repositories: snapshot.configuration().remote_repositories.len(),
                proxy_connectors: snapshot.proxy_connectors().len(),
                resolved_connectors: snapshot
                    .managed_repositories()
                    .iter()
                    .map(|r| runtime.resolver.get_connectors(&r.id).len())
                    .sum(),
                network_proxies: snapshot.network_proxies().len(),
            };
            print(format, &report, || {
                format!(
                    "Configuration OK: {} managed, {} remote, {}/{} connectors resolved, {} network proxies",
                    report.managed_repositories,
                    report.remote_repositories,
                    report.resolved_connectors,
                    report.proxy_connectors,
                    report.network_proxies
                )
            })?;
            Ok(report.resolved_connectors == report.proxy_connectors)
        }
    }
}
