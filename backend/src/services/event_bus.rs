use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::ConfigurationSnapshot;

/// Configuration property names published on the bus.
pub mod properties {
    pub const MANAGED_REPOSITORIES: &str = "managed_repositories";
    pub const REMOTE_REPOSITORIES: &str = "remote_repositories";
    pub const PROXY_CONNECTORS: &str = "proxy_connectors";
    pub const NETWORK_PROXIES: &str = "network_proxies";
    /// Whole configuration file reloaded.
    pub const CONFIGURATION: &str = "configuration";
}

/// Published when a configuration property changes.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationEvent {
    /// Name of the changed property, e.g. "proxy_connectors"
    pub property: String,
    /// Configuration as of this change
    #[serde(skip)]
    pub snapshot: Arc<ConfigurationSnapshot>,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl ConfigurationEvent {
    /// Create a configuration event timestamped to now.
    pub fn now(property: impl Into<String>, snapshot: Arc<ConfigurationSnapshot>) -> Self {
        Self {
            property: property.into(),
            snapshot,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Broadcast-based bus for configuration changes.
///
/// Subscribers receive events via `tokio::sync::broadcast`. If a subscriber
/// falls behind, it receives `RecvError::Lagged` and should rebuild from the
/// current snapshot.
pub struct EventBus {
    tx: broadcast::Sender<ConfigurationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. If there are no subscribers the event is dropped silently.
    pub fn publish(&self, event: ConfigurationEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigurationEvent> {
        self.tx.subscribe()
    }

    /// Convenience: create a timestamped event and publish it in one call.
    pub fn emit(&self, property: &str, snapshot: Arc<ConfigurationSnapshot>) {
        self.publish(ConfigurationEvent::now(property, snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfiguration;

    fn snapshot() -> Arc<ConfigurationSnapshot> {
        Arc::new(ConfigurationSnapshot::new(RepositoryConfiguration::default()))
    }

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ConfigurationEvent {
            property: properties::PROXY_CONNECTORS.into(),
            snapshot: snapshot(),
            timestamp: "2026-01-01T00:00:00Z".into(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.property, "proxy_connectors");
    }

    #[tokio::test]
    async fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(properties::CONFIGURATION, snapshot());
    }

    #[tokio::test]
    async fn lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for _ in 0..5 {
            bus.emit(properties::NETWORK_PROXIES, snapshot());
        }

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            other => panic!("Expected Lagged, got {:?}", other.map(|e| e.property)),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(properties::REMOTE_REPOSITORIES, snapshot());

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.property, e2.property);
        assert!(Arc::ptr_eq(&e1.snapshot, &e2.snapshot));
    }

    #[test]
    fn event_now_sets_timestamp() {
        let event = ConfigurationEvent::now("managed_repositories", snapshot());
        assert_eq!(event.property, "managed_repositories");
        chrono::DateTime::parse_from_rfc3339(&event.timestamp)
            .expect("timestamp should be valid RFC 3339");
    }

    #[test]
    fn event_serializes_without_snapshot() {
        let event = ConfigurationEvent::now("proxy_connectors", snapshot());
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""property":"proxy_connectors""#));
        assert!(!json.contains("snapshot"));
    }
}
