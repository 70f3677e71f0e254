//! Proxy metrics.
//!
//! Counters are recorded through the `metrics` facade; installing an
//! exporter is left to the embedding process.

use metrics::{counter, histogram};

/// Outcome label of one connector attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Found,
    NotModified,
    SkippedByPolicy,
    SkippedByList,
    TransferFailed,
    ChecksumFailed,
}

impl FetchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::NotModified => "not_modified",
            Self::SkippedByPolicy => "skipped_policy",
            Self::SkippedByList => "skipped_list",
            Self::TransferFailed => "transfer_failed",
            Self::ChecksumFailed => "checksum_failed",
        }
    }
}

/// Record one connector attempt.
pub fn record_fetch(repository: &str, connector: &str, outcome: FetchOutcome) {
    counter!(
        "ak_proxy_fetch_total",
        "repository" => repository.to_string(),
        "connector" => connector.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record bytes received from a remote repository.
pub fn record_transfer_bytes(remote: &str, bytes: u64) {
    histogram!("ak_proxy_transfer_bytes", "remote" => remote.to_string()).record(bytes as f64);
}

/// Record a URL entering the negative cache.
pub fn record_cached_failure(remote: &str) {
    counter!("ak_proxy_cached_failures_total", "remote" => remote.to_string()).increment(1);
}

/// Record a metadata document rebuild.
pub fn record_metadata_update(repository: &str, success: bool) {
    counter!(
        "ak_metadata_updates_total",
        "repository" => repository.to_string(),
        "status" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(FetchOutcome::Found.as_str(), "found");
        assert_eq!(FetchOutcome::SkippedByList.as_str(), "skipped_list");
        assert_eq!(FetchOutcome::ChecksumFailed.as_str(), "checksum_failed");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_fetch("internal", "internal->central", FetchOutcome::Found);
        record_transfer_bytes("central", 1024);
        record_cached_failure("central");
        record_metadata_update("internal", true);
    }
}
