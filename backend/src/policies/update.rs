//! Release and snapshot update policies.
//!
//! Both share one evaluation; each only governs requests of its own kind
//! and lets the other kind through untouched.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use super::{check_option, PolicyRequest, PreDownloadPolicy};
use crate::error::Result;

pub const ALWAYS: &str = "always";
pub const NEVER: &str = "never";
pub const ONCE: &str = "once";
pub const DAILY: &str = "daily";
pub const HOURLY: &str = "hourly";

const OPTIONS: &[&str] = &[ALWAYS, NEVER, ONCE, DAILY, HOURLY];

const ONE_HOUR: Duration = Duration::from_secs(60 * 60);
const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Governs non-snapshot requests (metadata included).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleasesPolicy;

/// Governs snapshot requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotsPolicy;

/// Whether a local copy last modified at `modified` should be refetched.
fn is_stale(modified: SystemTime, max_age: Duration) -> bool {
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age >= max_age,
        // Modified in the future: clock skew, treat as fresh
        Err(_) => false,
    }
}

async fn evaluate(policy_id: &str, setting: &str, request: &PolicyRequest<'_>) -> Result<bool> {
    let setting = check_option(policy_id, OPTIONS, setting)?;
    match setting.as_str() {
        ALWAYS => return Ok(true),
        NEVER => return Ok(false),
        _ => {}
    }

    let metadata = match tokio::fs::metadata(request.local_file).await {
        Ok(m) => m,
        // Absent locally: once/daily/hourly all fetch
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };

    let max_age = match setting.as_str() {
        ONCE => return Ok(false),
        DAILY => ONE_DAY,
        _ => ONE_HOUR,
    };
    Ok(is_stale(metadata.modified()?, max_age))
}

#[async_trait]
impl PreDownloadPolicy for ReleasesPolicy {
    fn id(&self) -> &'static str {
        "releases"
    }

    fn options(&self) -> &'static [&'static str] {
        OPTIONS
    }

    fn default_option(&self) -> &'static str {
        ALWAYS
    }

    async fn apply(&self, setting: &str, request: &PolicyRequest<'_>) -> Result<bool> {
        if request.snapshot {
            return Ok(true);
        }
        evaluate(self.id(), setting, request).await
    }
}

#[async_trait]
impl PreDownloadPolicy for SnapshotsPolicy {
    fn id(&self) -> &'static str {
        "snapshots"
    }

    fn options(&self) -> &'static [&'static str] {
        OPTIONS
    }

    fn default_option(&self) -> &'static str {
        ALWAYS
    }

    async fn apply(&self, setting: &str, request: &PolicyRequest<'_>) -> Result<bool> {
        if !request.snapshot {
            return Ok(true);
        }
        evaluate(self.id(), setting, request).await
    }
}
