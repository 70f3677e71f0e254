//! Connector fetch policies.
//!
//! Pre-download policies decide whether a remote fetch is attempted at all;
//! post-download policies validate what was transferred. A policy answering
//! `false` only skips the current connector.

pub mod cached_failures;
pub mod checksum;
pub mod update;

use std::path::Path;

use async_trait::async_trait;

use crate::error::{AppError, Result};

pub use cached_failures::{CachedFailuresPolicy, UrlFailureCache};
pub use checksum::ChecksumPolicy;
pub use update::{ReleasesPolicy, SnapshotsPolicy};

/// Inputs every policy sees for one connector attempt.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRequest<'a> {
    /// Full remote URL of the resource
    pub url: &'a str,
    /// Whether the requested version is a snapshot
    pub snapshot: bool,
    /// Destination (or staged) local file
    pub local_file: &'a Path,
}

#[async_trait]
pub trait PreDownloadPolicy: Send + Sync {
    /// Key of the policy in a connector's settings.
    fn id(&self) -> &'static str;

    fn options(&self) -> &'static [&'static str];

    fn default_option(&self) -> &'static str;

    /// `Ok(true)` when the fetch may proceed.
    async fn apply(&self, setting: &str, request: &PolicyRequest<'_>) -> Result<bool>;
}

#[async_trait]
pub trait PostDownloadPolicy: Send + Sync {
    fn id(&self) -> &'static str;

    fn options(&self) -> &'static [&'static str];

    fn default_option(&self) -> &'static str;

    /// `Ok(true)` when the transferred file is acceptable.
    async fn apply(&self, setting: &str, request: &PolicyRequest<'_>) -> Result<bool>;
}

/// Normalise a configured setting and check it against the allowed options.
pub(crate) fn check_option(
    policy_id: &str,
    options: &[&str],
    setting: &str,
) -> Result<String> {
    let normalized = setting.trim().to_lowercase();
    if options.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(AppError::Policy(format!(
            "Unknown setting '{}' for policy '{}' (expected one of: {})",
            setting,
            policy_id,
            options.join(", ")
        )))
    }
}

/// Default pre-download chain: release and snapshot freshness, then the
/// negative cache.
pub fn default_pre_download_policies(
    failures: std::sync::Arc<UrlFailureCache>,
) -> Vec<Box<dyn PreDownloadPolicy>> {
    vec![
        Box::new(ReleasesPolicy),
        Box::new(SnapshotsPolicy),
        Box::new(CachedFailuresPolicy::new(failures)),
    ]
}
