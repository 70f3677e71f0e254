//! Maven 2 repository layout.

use super::{
    file_name, require_field, split_extension, split_segments, validate_artifact,
    RepositoryLayout, METADATA_FILENAME,
};
use crate::error::{AppError, Result};
use crate::models::reference::{
    ArtifactReference, MetadataReference, ProjectReference, VersionedReference,
};
use crate::models::repository::LayoutType;
use crate::version;

/// `group/path/artifactId/baseVersion/artifactId-version[-classifier].type`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLayout;

fn group_path(group_id: &str) -> String {
    group_id.replace('.', "/")
}

/// A metadata parent directory names a version when it starts with a digit
/// or carries a snapshot marker.
fn looks_like_version(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_ascii_digit()) || version::is_snapshot(segment)
}

impl DefaultLayout {
    /// Work out the file version from the version directory and the text
    /// after `artifactId-`. Returns the version and the unconsumed tail.
    fn split_version<'a>(version_dir: &str, rest: &'a str) -> Option<(String, &'a str)> {
        if let Some(tail) = rest.strip_prefix(version_dir) {
            if tail.starts_with('.') || tail.starts_with('-') {
                return Some((version_dir.to_string(), tail));
            }
        }

        // Unique snapshot files live in the `-SNAPSHOT` directory.
        let base = version_dir.strip_suffix(&format!("-{}", version::SNAPSHOT))?;
        let after_base = rest.strip_prefix(base)?.strip_prefix('-')?;
        // yyyyMMdd.HHmmss-build
        let timestamp = after_base.get(..15)?;
        let build_and_tail = after_base.get(15..)?.strip_prefix('-')?;
        let digits = build_and_tail
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if digits == 0 {
            return None;
        }
        let candidate = format!("{}-{}-{}", base, timestamp, &build_and_tail[..digits]);
        if !version::is_unique_snapshot(&candidate) {
            return None;
        }
        Some((candidate, &build_and_tail[digits..]))
    }
}

impl RepositoryLayout for DefaultLayout {
    fn layout_type(&self) -> LayoutType {
        LayoutType::Default
    }

    fn to_path(&self, artifact: &ArtifactReference) -> Result<String> {
        validate_artifact(artifact)?;
        let mut path = format!(
            "{}/{}/{}/{}-{}",
            group_path(&artifact.group_id),
            artifact.artifact_id,
            artifact.base_version(),
            artifact.artifact_id,
            artifact.version
        );
        if let Some(classifier) = &artifact.classifier {
            path.push('-');
            path.push_str(classifier);
        }
        path.push('.');
        path.push_str(&artifact.artifact_type);
        Ok(path)
    }

    fn to_metadata_path(&self, reference: &MetadataReference) -> Result<String> {
        require_field(reference.group_id(), "groupId", reference)?;
        require_field(reference.artifact_id(), "artifactId", reference)?;
        match reference {
            MetadataReference::Project(r) => Ok(format!(
                "{}/{}/{}",
                group_path(&r.group_id),
                r.artifact_id,
                METADATA_FILENAME
            )),
            MetadataReference::Versioned(r) => {
                require_field(&r.version, "version", reference)?;
                Ok(format!(
                    "{}/{}/{}/{}",
                    group_path(&r.group_id),
                    r.artifact_id,
                    r.version,
                    METADATA_FILENAME
                ))
            }
        }
    }

    fn to_artifact_reference(&self, path: &str) -> Result<ArtifactReference> {
        let parts = split_segments(path)?;
        if parts.len() < 4 {
            return Err(AppError::Layout(format!(
                "Path '{}' has too few segments for the default layout",
                path
            )));
        }
        let n = parts.len();
        let filename = parts[n - 1];
        let version_dir = parts[n - 2];
        let artifact_id = parts[n - 3];
        let group_id = parts[..n - 3].join(".");

        if filename.starts_with("maven-metadata") {
            return Err(AppError::Layout(format!(
                "Path '{}' names a metadata document, not an artifact",
                path
            )));
        }

        let rest = filename
            .strip_prefix(artifact_id)
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(|| {
                AppError::Layout(format!(
                    "Filename '{}' does not start with artifactId '{}'",
                    filename, artifact_id
                ))
            })?;

        let (version, tail) = Self::split_version(version_dir, rest).ok_or_else(|| {
            AppError::Layout(format!(
                "Filename '{}' does not match version directory '{}'",
                filename, version_dir
            ))
        })?;

        let (classifier, artifact_type) = if let Some(ext) = tail.strip_prefix('.') {
            if ext.is_empty() {
                return Err(missing_extension(filename));
            }
            (None, ext.to_string())
        } else if let Some(with_classifier) = tail.strip_prefix('-') {
            let (classifier, ext) =
                split_extension(with_classifier).ok_or_else(|| missing_extension(filename))?;
            if classifier.is_empty() {
                return Err(AppError::Layout(format!(
                    "Filename '{}' has an empty classifier",
                    filename
                )));
            }
            (Some(classifier.to_string()), ext.to_string())
        } else {
            return Err(missing_extension(filename));
        };

        Ok(ArtifactReference {
            group_id,
            artifact_id: artifact_id.to_string(),
            version,
            classifier,
            artifact_type,
        })
    }

    fn to_metadata_reference(&self, path: &str) -> Result<MetadataReference> {
        let parts = split_segments(path)?;
        if file_name(path) != METADATA_FILENAME {
            return Err(AppError::Layout(format!(
                "Path '{}' is not a metadata document",
                path
            )));
        }
        let n = parts.len();
        if n < 3 {
            return Err(AppError::Layout(format!(
                "Metadata path '{}' has too few segments",
                path
            )));
        }
        let parent = parts[n - 2];
        if n >= 4 && looks_like_version(parent) {
            Ok(VersionedReference::new(parts[..n - 3].join("."), parts[n - 3], parent).into())
        } else {
            Ok(ProjectReference::new(parts[..n - 2].join("."), parent).into())
        }
    }
}

fn missing_extension(filename: &str) -> AppError {
    AppError::Layout(format!("Filename '{}' has no type extension", filename))
}
