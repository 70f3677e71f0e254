//! Artifact Keeper Proxy - Library
//!
//! Repository proxy connectors: fetches artifacts and metadata for managed
//! Maven repositories from ordered remote repositories, under update,
//! checksum and failure-cache policies.

pub mod cli;
pub mod config;
pub mod error;
pub mod layout;
pub mod models;
pub mod policies;
pub mod services;
pub mod storage;
pub mod telemetry;
pub mod transfer;
pub mod version;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::proxy_service::ProxyService;
