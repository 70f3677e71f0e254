//! Rebuilds `maven-metadata.xml` documents of a managed repository from
//! what is on disk and the remote copies fetched next to them.

use std::path::Path;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::metadata::{ArchivaRepositoryMetadata, SnapshotVersion};
use crate::models::reference::{MetadataReference, ProjectReference, VersionedReference};
use crate::services::checksum_service::{checksum_path, ChecksumAlgorithm, ChecksummedFile};
use crate::services::metadata_merge::{latest_and_release, merge_metadata, newer_snapshot};
use crate::services::metrics_service;
use crate::storage::ManagedRepositoryContent;
use crate::transfer::{self, StagingArea, TransferError};
use crate::version;

/// `lastUpdated` stamp for now.
pub fn last_updated_now() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Rebuild and write the metadata document for `reference`, returning the
/// written document.
pub async fn update_metadata(
    content: &ManagedRepositoryContent,
    reference: &MetadataReference,
) -> Result<ArchivaRepositoryMetadata> {
    let result = match reference {
        MetadataReference::Project(project) => build_project_metadata(content, project).await,
        MetadataReference::Versioned(versioned) => {
            build_versioned_metadata(content, versioned).await
        }
    };

    let metadata = match result {
        Ok(metadata) => metadata,
        Err(e) => {
            metrics_service::record_metadata_update(content.id(), false);
            return Err(e);
        }
    };

    let file = content.metadata_file(reference)?;
    write_metadata(&file, &metadata).await?;
    metrics_service::record_metadata_update(content.id(), true);
    tracing::debug!(
        repository = %content.id(),
        reference = %reference,
        "Updated metadata"
    );
    Ok(metadata)
}

/// Fold every readable remote copy of a document into `base`.
async fn merge_proxied(
    content: &ManagedRepositoryContent,
    reference: &MetadataReference,
    mut base: ArchivaRepositoryMetadata,
) -> Result<(ArchivaRepositoryMetadata, usize)> {
    let mut merged = 0;
    for (remote_id, file) in content.proxied_metadata_files(reference).await? {
        match read_metadata(&file).await {
            Ok(proxied) => {
                base = merge_metadata(&base, &proxied);
                merged += 1;
            }
            Err(e) => {
                tracing::warn!(
                    repository = %content.id(),
                    remote = %remote_id,
                    path = %file.display(),
                    "Skipping unreadable proxied metadata: {}",
                    e
                );
            }
        }
    }
    Ok((base, merged))
}

async fn build_project_metadata(
    content: &ManagedRepositoryContent,
    project: &ProjectReference,
) -> Result<ArchivaRepositoryMetadata> {
    let reference = MetadataReference::Project(project.clone());
    let mut local_versions = content.get_versions(project).await?;
    version::sort_versions(&mut local_versions);

    let base = ArchivaRepositoryMetadata {
        group_id: Some(project.group_id.clone()),
        artifact_id: Some(project.artifact_id.clone()),
        available_versions: local_versions,
        ..Default::default()
    };
    let (mut metadata, _) = merge_proxied(content, &reference, base).await?;

    if metadata.available_versions.is_empty() {
        return Err(AppError::NotFound(format!(
            "No versions of {} found in repository '{}'",
            project,
            content.id()
        )));
    }

    let (latest, release) = latest_and_release(&metadata.available_versions);
    metadata.latest_version = latest;
    metadata.released_version = release;
    metadata.version = None;
    metadata.snapshot_version = None;
    metadata.last_updated = Some(last_updated_now());
    Ok(metadata)
}

async fn build_versioned_metadata(
    content: &ManagedRepositoryContent,
    versioned: &VersionedReference,
) -> Result<ArchivaRepositoryMetadata> {
    let reference = MetadataReference::Versioned(versioned.clone());
    let base = ArchivaRepositoryMetadata {
        group_id: Some(versioned.group_id.clone()),
        artifact_id: Some(versioned.artifact_id.clone()),
        version: Some(versioned.version.clone()),
        ..Default::default()
    };
    let (mut metadata, _) = merge_proxied(content, &reference, base).await?;

    if version::is_snapshot(&versioned.version) {
        let local = content
            .unique_snapshot_versions(versioned)
            .await?
            .last()
            .and_then(|v| version::parse_unique_snapshot(v))
            .map(|snap| SnapshotVersion::new(snap.timestamp, snap.build_number));
        metadata.snapshot_version = newer_snapshot(&metadata.snapshot_version, &local);
    } else {
        metadata.snapshot_version = None;
    }

    // Versioned documents describe one version only.
    metadata.available_versions.clear();
    metadata.latest_version = None;
    metadata.released_version = None;
    metadata.last_updated = Some(last_updated_now());
    Ok(metadata)
}

pub async fn read_metadata(file: &Path) -> Result<ArchivaRepositoryMetadata> {
    let bytes = tokio::fs::read(file).await?;
    ArchivaRepositoryMetadata::from_bytes(&bytes)
}

/// Write a document and its checksum sidecars. Everything is staged next to
/// `file` and renamed into place, so readers never see a partial document.
pub async fn write_metadata(file: &Path, metadata: &ArchivaRepositoryMetadata) -> Result<()> {
    let parent = file
        .parent()
        .ok_or_else(|| AppError::Internal(format!("{} has no parent directory", file.display())))?;
    tokio::fs::create_dir_all(parent).await?;

    let staging = StagingArea::create(parent).await?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("maven-metadata.xml");
    let staged = staging.file(file_name);
    tokio::fs::write(&staged, metadata.to_xml()).await?;
    ChecksummedFile::new(staged.clone()).fix_checksums().await?;

    let store = |e: TransferError| {
        AppError::Storage(format!("Failed to store {}: {}", file.display(), e))
    };
    transfer::promote(&staged, file).await.map_err(store)?;
    for algorithm in ChecksumAlgorithm::ALL {
        transfer::promote(&checksum_path(&staged, algorithm), &checksum_path(file, algorithm))
            .await
            .map_err(store)?;
    }
    Ok(())
}
