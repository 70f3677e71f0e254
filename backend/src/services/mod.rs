//! Business logic services.

pub mod checksum_service;
pub mod connector_resolver;
pub mod event_bus;
pub mod metadata_merge;
pub mod metadata_service;
pub mod metrics_service;
pub mod project_merge;
pub mod proxy_service;
