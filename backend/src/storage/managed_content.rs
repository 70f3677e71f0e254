//! Filesystem view of a managed repository under its layout.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::layout::{self, RepositoryLayout};
use crate::models::reference::{
    ArtifactReference, MetadataReference, ProjectReference, VersionedReference,
};
use crate::models::repository::ManagedRepository;
use crate::version;

/// Resolves references to files inside one managed repository.
#[derive(Clone)]
pub struct ManagedRepositoryContent {
    repository: ManagedRepository,
    layout: &'static dyn RepositoryLayout,
}

impl std::fmt::Debug for ManagedRepositoryContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedRepositoryContent")
            .field("repository", &self.repository.id)
            .field("layout", &self.repository.layout)
            .finish()
    }
}

impl ManagedRepositoryContent {
    pub fn new(repository: ManagedRepository) -> Self {
        let layout = layout::for_type(repository.layout);
        Self { repository, layout }
    }

    pub fn repository(&self) -> &ManagedRepository {
        &self.repository
    }

    pub fn id(&self) -> &str {
        &self.repository.id
    }

    pub fn layout(&self) -> &'static dyn RepositoryLayout {
        self.layout
    }

    pub fn root(&self) -> &Path {
        &self.repository.location
    }

    /// Absolute file for a repository-relative path. Paths escaping the
    /// repository root are rejected.
    pub fn to_file(&self, relative_path: &str) -> Result<PathBuf> {
        let relative = relative_path.trim_start_matches('/');
        if relative.is_empty() || relative.split('/').any(|s| s == ".." || s == ".") {
            return Err(AppError::Validation(format!(
                "Invalid repository path '{}'",
                relative_path
            )));
        }
        Ok(self.repository.location.join(relative))
    }

    pub fn artifact_path(&self, artifact: &ArtifactReference) -> Result<String> {
        self.layout.to_path(artifact)
    }

    pub fn artifact_file(&self, artifact: &ArtifactReference) -> Result<PathBuf> {
        self.to_file(&self.artifact_path(artifact)?)
    }

    pub fn metadata_path(&self, reference: &MetadataReference) -> Result<String> {
        self.layout.to_metadata_path(reference)
    }

    pub fn metadata_file(&self, reference: &MetadataReference) -> Result<PathBuf> {
        self.to_file(&self.metadata_path(reference)?)
    }

    /// Directory holding a project's version directories.
    fn project_dir(&self, project: &ProjectReference) -> Result<PathBuf> {
        let metadata = self.metadata_file(&MetadataReference::Project(project.clone()))?;
        metadata
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| AppError::Internal("Metadata file has no parent".to_string()))
    }

    /// Version directories of a project that contain at least one file of
    /// the project. Unsorted.
    pub async fn get_versions(&self, project: &ProjectReference) -> Result<Vec<String>> {
        let dir = self.project_dir(project)?;
        let prefix = format!("{}-", project.artifact_id);

        tokio::task::spawn_blocking(move || {
            let mut versions = Vec::new();
            if !dir.is_dir() {
                return versions;
            }
            for entry in walkdir::WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir())
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let has_artifact = walkdir::WalkDir::new(entry.path())
                    .min_depth(1)
                    .max_depth(1)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .any(|f| {
                        f.file_type().is_file()
                            && f.file_name().to_string_lossy().starts_with(&prefix)
                    });
                if has_artifact {
                    versions.push(name);
                }
            }
            versions
        })
        .await
        .map_err(|e| AppError::Internal(format!("Version listing task failed: {}", e)))
    }

    /// Artifacts found in a version directory that parse under the layout.
    pub async fn get_artifacts(&self, versioned: &VersionedReference) -> Result<Vec<ArtifactReference>> {
        let metadata = self.metadata_file(&MetadataReference::Versioned(versioned.clone()))?;
        let Some(dir) = metadata.parent().map(Path::to_path_buf) else {
            return Ok(Vec::new());
        };
        let root = self.repository.location.clone();
        let layout = self.layout;
        let versioned = versioned.clone();

        tokio::task::spawn_blocking(move || {
            let mut artifacts = Vec::new();
            if !dir.is_dir() {
                return artifacts;
            }
            for entry in walkdir::WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let relative = relative.to_string_lossy().replace('\\', "/");
                if layout::is_checksum_path(&relative) {
                    continue;
                }
                if let Ok(artifact) = layout.to_artifact_reference(&relative) {
                    if artifact.group_id == versioned.group_id
                        && artifact.artifact_id == versioned.artifact_id
                        && artifact.base_version() == versioned.version
                    {
                        artifacts.push(artifact);
                    }
                }
            }
            artifacts
        })
        .await
        .map_err(|e| AppError::Internal(format!("Artifact listing task failed: {}", e)))
    }

    /// Distinct unique snapshot versions present in a snapshot version
    /// directory.
    pub async fn unique_snapshot_versions(&self, versioned: &VersionedReference) -> Result<Vec<String>> {
        let mut versions: Vec<String> = self
            .get_artifacts(versioned)
            .await?
            .into_iter()
            .map(|a| a.version)
            .filter(|v| version::is_unique_snapshot(v))
            .collect();
        version::sort_versions(&mut versions);
        Ok(versions)
    }

    /// Remote copies of a metadata document stored next to it, as
    /// `(remote id, file)` pairs sorted by remote id.
    pub async fn proxied_metadata_files(&self, reference: &MetadataReference) -> Result<Vec<(String, PathBuf)>> {
        let metadata = self.metadata_file(reference)?;
        let Some(dir) = metadata.parent() else {
            return Ok(Vec::new());
        };
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(remote_id) = layout::proxied_metadata_remote_id(&name) {
                files.push((remote_id.to_string(), entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }
}
