//! Shared fixtures for proxy integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use artifact_keeper_proxy::config::{ConfigurationSnapshot, RepositoryConfiguration};
use artifact_keeper_proxy::models::proxy_connector::{PolicySettings, ProxyConnectorConfig};
use artifact_keeper_proxy::models::repository::{
    LayoutType, ManagedRepository, RemoteRepository, RepositoryReference,
};
use artifact_keeper_proxy::policies::UrlFailureCache;
use artifact_keeper_proxy::services::connector_resolver::ConnectorResolver;
use artifact_keeper_proxy::transfer::{TransferClients, TransferSettings};
use artifact_keeper_proxy::ProxyService;
use sha1::{Digest, Sha1};

pub fn managed(id: &str, location: &Path) -> ManagedRepository {
    ManagedRepository {
        id: id.into(),
        name: None,
        location: location.to_path_buf(),
        layout: LayoutType::Default,
    }
}

pub fn remote(id: &str, url: &str) -> RemoteRepository {
    RemoteRepository {
        id: id.into(),
        name: None,
        url: url.into(),
        layout: LayoutType::Default,
        username: None,
        password: None,
        timeout_secs: Some(5),
    }
}

pub fn connector(source: &str, target: &str, order: u32) -> ProxyConnectorConfig {
    ProxyConnectorConfig {
        source_repo_id: source.into(),
        target_repo_id: target.into(),
        order,
        proxy_id: None,
        policies: PolicySettings::default(),
        white_list_patterns: Vec::new(),
        black_list_patterns: Vec::new(),
    }
}

pub fn service(config: RepositoryConfiguration) -> ProxyService {
    let resolver = Arc::new(ConnectorResolver::from_snapshot(&ConfigurationSnapshot::new(
        config,
    )));
    ProxyService::new(
        resolver,
        TransferClients::with_defaults(&TransferSettings::default()),
        Arc::new(UrlFailureCache::new(64, Duration::from_secs(300))),
    )
}

pub fn reference(repo: &ManagedRepository) -> RepositoryReference {
    RepositoryReference::Managed(repo.clone())
}

pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// A fixed Last-Modified value so conditional fetches can compare.
pub const LAST_MODIFIED: &str = "Tue, 02 Jan 2024 03:04:05 GMT";
