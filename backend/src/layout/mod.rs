//! Repository layouts: bidirectional translation between references and
//! repository-relative paths.
//!
//! Two layouts are supported:
//!
//! - **default** (Maven 2):
//!   `group/path/artifactId/version/artifactId-version[-classifier].type`
//! - **legacy** (Maven 1): `groupId/types/artifactId-version.ext`
//!
//! Every valid artifact reference survives a render/parse round trip under
//! the same layout.

pub mod default;
pub mod legacy;

use crate::error::{AppError, Result};
use crate::models::reference::{ArtifactReference, MetadataReference};
use crate::models::repository::LayoutType;

pub use default::DefaultLayout;
pub use legacy::LegacyLayout;

/// Name of the merged metadata document.
pub const METADATA_FILENAME: &str = "maven-metadata.xml";

/// Checksum sidecar extensions transferred alongside every resource.
pub const CHECKSUM_EXTENSIONS: [&str; 2] = ["sha1", "md5"];

pub trait RepositoryLayout: Send + Sync {
    fn layout_type(&self) -> LayoutType;

    /// Render an artifact reference as a repository-relative path.
    fn to_path(&self, artifact: &ArtifactReference) -> Result<String>;

    /// Render a project or versioned metadata location.
    fn to_metadata_path(&self, reference: &MetadataReference) -> Result<String>;

    /// Parse a repository-relative path into an artifact reference.
    fn to_artifact_reference(&self, path: &str) -> Result<ArtifactReference>;

    /// Parse a metadata document path into its reference.
    fn to_metadata_reference(&self, path: &str) -> Result<MetadataReference>;
}

static DEFAULT_LAYOUT: DefaultLayout = DefaultLayout;
static LEGACY_LAYOUT: LegacyLayout = LegacyLayout;

/// Layout implementation for a configured layout type.
pub fn for_type(layout: LayoutType) -> &'static dyn RepositoryLayout {
    match layout {
        LayoutType::Default => &DEFAULT_LAYOUT,
        LayoutType::Legacy => &LEGACY_LAYOUT,
    }
}

/// What kind of resource a request path names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind {
    Artifact(ArtifactReference),
    Metadata(MetadataReference),
    Checksum,
    Other,
}

pub fn is_metadata_path(path: &str) -> bool {
    file_name(path) == METADATA_FILENAME
}

pub fn is_checksum_path(path: &str) -> bool {
    CHECKSUM_EXTENSIONS
        .iter()
        .chain(std::iter::once(&"sha256"))
        .any(|ext| path.ends_with(&format!(".{}", ext)))
}

/// Classify a request path under a layout.
pub fn classify_path(layout: &dyn RepositoryLayout, path: &str) -> PathKind {
    if is_checksum_path(path) {
        return PathKind::Checksum;
    }
    if is_metadata_path(path) {
        return match layout.to_metadata_reference(path) {
            Ok(reference) => PathKind::Metadata(reference),
            Err(_) => PathKind::Other,
        };
    }
    match layout.to_artifact_reference(path) {
        Ok(artifact) => PathKind::Artifact(artifact),
        Err(_) => PathKind::Other,
    }
}

/// Location where a remote repository's copy of a metadata document is kept:
/// `maven-metadata.xml` becomes `maven-metadata-<remoteId>.xml`.
pub fn proxied_metadata_path(metadata_path: &str, remote_id: &str) -> String {
    let proxied = format!("maven-metadata-{}.xml", remote_id);
    match metadata_path.rfind('/') {
        Some(idx) => format!("{}/{}", &metadata_path[..idx], proxied),
        None => proxied,
    }
}

/// Extract the remote id from a `maven-metadata-<remoteId>.xml` filename.
pub fn proxied_metadata_remote_id(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix("maven-metadata-")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .filter(|id| !id.is_empty())
}

pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn split_segments(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(AppError::Layout("Empty repository path".to_string()));
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|p| p.is_empty() || *p == "." || *p == "..") {
        return Err(AppError::Layout(format!(
            "Invalid path segment in '{}'",
            path
        )));
    }
    Ok(parts)
}

pub(crate) fn require_field(value: &str, field: &str, reference: &dyn std::fmt::Display) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Layout(format!(
            "Reference '{}' lacks mandatory field {}",
            reference, field
        )));
    }
    Ok(())
}

pub(crate) fn validate_artifact(artifact: &ArtifactReference) -> Result<()> {
    require_field(&artifact.group_id, "groupId", artifact)?;
    require_field(&artifact.artifact_id, "artifactId", artifact)?;
    require_field(&artifact.version, "version", artifact)?;
    require_field(&artifact.artifact_type, "type", artifact)?;
    Ok(())
}

/// Split a file name tail into its extension, recognising compound
/// archive extensions.
pub(crate) fn split_extension(name: &str) -> Option<(&str, &str)> {
    for compound in ["tar.gz", "tar.bz2"] {
        if let Some(stem) = name.strip_suffix(&format!(".{}", compound)) {
            return Some((stem, compound));
        }
    }
    let dot = name.rfind('.')?;
    let ext = &name[dot + 1..];
    if ext.is_empty() {
        return None;
    }
    Some((&name[..dot], ext))
}
