//! Domain models for repositories, references, connectors, and metadata.

pub mod metadata;
pub mod project;
pub mod proxy_connector;
pub mod reference;
pub mod repository;
