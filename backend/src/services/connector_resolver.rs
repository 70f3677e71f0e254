//! Resolves the ordered proxy connectors of each managed repository.
//!
//! The connector table is rebuilt from a [`ConfigurationSnapshot`] into a
//! fresh value and swapped in whole, so readers see either the previous or
//! the new generation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::ConfigurationSnapshot;
use crate::models::proxy_connector::{NetworkProxy, ProxyConnector};
use crate::services::event_bus::{properties, ConfigurationEvent};

/// Properties whose change invalidates the connector table.
const WATCHED_PROPERTIES: &[&str] = &[
    properties::MANAGED_REPOSITORIES,
    properties::REMOTE_REPOSITORIES,
    properties::PROXY_CONNECTORS,
    properties::NETWORK_PROXIES,
    properties::CONFIGURATION,
];

/// One generation of resolved connectors and network proxies.
#[derive(Debug, Default)]
pub struct ConnectorTable {
    connectors: HashMap<String, Arc<Vec<ProxyConnector>>>,
}

impl ConnectorTable {
    pub fn build(snapshot: &ConfigurationSnapshot) -> Self {
        let network_proxies: HashMap<&str, &NetworkProxy> = snapshot
            .network_proxies()
            .iter()
            .map(|p| (p.id.as_str(), p))
            .collect();
        let mut grouped: HashMap<String, Vec<ProxyConnector>> = HashMap::new();

        for config in snapshot.proxy_connectors() {
            let Some(source) = snapshot.managed_repository(&config.source_repo_id) else {
                tracing::warn!(
                    source = %config.source_repo_id,
                    target = %config.target_repo_id,
                    "Dropping proxy connector with unknown managed repository"
                );
                continue;
            };
            let Some(target) = snapshot.remote_repository(&config.target_repo_id) else {
                tracing::warn!(
                    source = %config.source_repo_id,
                    target = %config.target_repo_id,
                    "Dropping proxy connector with unknown remote repository"
                );
                continue;
            };

            let proxy_id = config.proxy_id.clone().filter(|id| !id.trim().is_empty());
            let network_proxy = proxy_id.as_deref().and_then(|id| {
                let proxy = network_proxies.get(id).map(|p| (*p).clone());
                if proxy.is_none() {
                    tracing::warn!(
                        source = %config.source_repo_id,
                        target = %config.target_repo_id,
                        proxy = %id,
                        "Unknown network proxy, connector will connect directly"
                    );
                }
                proxy
            });

            grouped
                .entry(source.id.clone())
                .or_default()
                .push(ProxyConnector {
                    source: source.clone(),
                    target: target.clone(),
                    order: config.order,
                    proxy_id,
                    network_proxy,
                    policies: config.policies.clone(),
                    white_list: config.white_list_patterns.clone(),
                    black_list: config.black_list_patterns.clone(),
                });
        }

        let connectors = grouped
            .into_iter()
            .map(|(source, mut list)| {
                sort_connectors(&mut list);
                (source, Arc::new(list))
            })
            .collect();

        Self { connectors }
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.values().map(|list| list.len()).sum()
    }
}

/// Ordered connectors (order > 0) ascending, then unordered ones in
/// configuration order. The sort is stable.
fn sort_connectors(connectors: &mut [ProxyConnector]) {
    connectors.sort_by_key(|c| if c.order == 0 { u32::MAX } else { c.order });
}

/// Shared, swappable view of the connector table.
#[derive(Debug, Default)]
pub struct ConnectorResolver {
    table: RwLock<Arc<ConnectorTable>>,
}

impl ConnectorResolver {
    /// Empty resolver; every lookup returns no connectors until the first
    /// rebuild.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &ConfigurationSnapshot) -> Self {
        let resolver = Self::new();
        resolver.rebuild(snapshot);
        resolver
    }

    fn current(&self) -> Arc<ConnectorTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Build a new table from `snapshot` and swap it in.
    pub fn rebuild(&self, snapshot: &ConfigurationSnapshot) {
        let table = Arc::new(ConnectorTable::build(snapshot));
        let count = table.connector_count();
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = table;
        tracing::debug!(connectors = count, "Rebuilt proxy connector table");
    }

    /// Ordered connectors of a managed repository; empty when it has none.
    pub fn get_connectors(&self, source_repo_id: &str) -> Arc<Vec<ProxyConnector>> {
        self.current()
            .connectors
            .get(source_repo_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_proxies(&self, source_repo_id: &str) -> bool {
        self.current()
            .connectors
            .get(source_repo_id)
            .is_some_and(|list| !list.is_empty())
    }

    /// Rebuild when `event` names a watched property. Returns whether a
    /// rebuild happened.
    pub fn on_configuration_changed(&self, event: &ConfigurationEvent) -> bool {
        if !WATCHED_PROPERTIES.contains(&event.property.as_str()) {
            return false;
        }
        self.rebuild(&event.snapshot);
        true
    }

    /// Rebuild on every relevant event until the bus closes.
    pub fn spawn_watcher(
        self: Arc<Self>,
        mut events: broadcast::Receiver<ConfigurationEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.on_configuration_changed(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Later events carry a full snapshot; the next one catches up.
                        tracing::warn!(skipped, "Connector watcher lagged behind configuration events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
