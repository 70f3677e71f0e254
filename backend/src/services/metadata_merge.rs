//! Metadata document merging.

use std::cmp::Ordering;

use crate::models::metadata::{ArchivaRepositoryMetadata, SnapshotVersion};
use crate::services::project_merge::merge_string;
use crate::version;

/// Merge `source` into `main`, producing a new document.
///
/// Identity and version markers keep main's value when present. Versions
/// are unioned and sorted, the newer snapshot and the later `lastUpdated`
/// win.
pub fn merge_metadata(
    main: &ArchivaRepositoryMetadata,
    source: &ArchivaRepositoryMetadata,
) -> ArchivaRepositoryMetadata {
    let mut available_versions: Vec<String> = main
        .available_versions
        .iter()
        .chain(source.available_versions.iter())
        .cloned()
        .collect();
    version::sort_versions(&mut available_versions);

    ArchivaRepositoryMetadata {
        group_id: merge_string(&main.group_id, &source.group_id),
        artifact_id: merge_string(&main.artifact_id, &source.artifact_id),
        version: merge_string(&main.version, &source.version),
        latest_version: merge_string(&main.latest_version, &source.latest_version),
        released_version: merge_string(&main.released_version, &source.released_version),
        snapshot_version: newer_snapshot(&main.snapshot_version, &source.snapshot_version),
        available_versions,
        last_updated: later(&main.last_updated, &source.last_updated),
    }
}

fn compare_snapshots(a: &SnapshotVersion, b: &SnapshotVersion) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.build_number.cmp(&b.build_number))
}

/// The newer of two snapshot descriptors: later timestamp, then higher
/// build number.
pub fn newer_snapshot(
    a: &Option<SnapshotVersion>,
    b: &Option<SnapshotVersion>,
) -> Option<SnapshotVersion> {
    match (a, b) {
        (Some(x), Some(y)) => {
            if compare_snapshots(y, x) == Ordering::Greater {
                Some(y.clone())
            } else {
                Some(x.clone())
            }
        }
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (None, None) => None,
    }
}

/// `yyyyMMddHHmmss` stamps order lexicographically.
fn later(a: &Option<String>, b: &Option<String>) -> Option<String> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if y > x { y.clone() } else { x.clone() }),
        (Some(x), None) => Some(x.clone()),
        (None, y) => y.clone(),
    }
}

/// Highest version and highest non-snapshot version of a sorted list.
pub fn latest_and_release(sorted_versions: &[String]) -> (Option<String>, Option<String>) {
    let latest = sorted_versions.last().cloned();
    let release = sorted_versions
        .iter()
        .rev()
        .find(|v| !version::is_snapshot(v))
        .cloned();
    (latest, release)
}
