//! Artifact, project, and versioned references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version;

/// Identifies a single file within a repository layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReference {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(rename = "type")]
    pub artifact_type: String,
}

impl ArtifactReference {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        classifier: Option<&str>,
        artifact_type: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            classifier: classifier
                .filter(|c| !c.trim().is_empty())
                .map(str::to_string),
            artifact_type: artifact_type.into(),
        }
    }

    /// `groupId:artifactId[:classifier]:type`; version is deliberately excluded.
    pub fn versionless_key(&self) -> String {
        versionless_key(
            &self.group_id,
            &self.artifact_id,
            self.classifier.as_deref(),
            &self.artifact_type,
        )
    }

    pub fn is_snapshot(&self) -> bool {
        version::is_snapshot(&self.version)
    }

    /// Version directory the artifact lives in (unique snapshots collapse to
    /// their `-SNAPSHOT` base version).
    pub fn base_version(&self) -> String {
        version::base_version(&self.version)
    }

    pub fn versioned(&self) -> VersionedReference {
        VersionedReference {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.base_version(),
        }
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        write!(f, ":{}", self.artifact_type)
    }
}

/// Merge key shared by dependencies, plugins, and reports.
pub fn versionless_key(
    group_id: &str,
    artifact_id: &str,
    classifier: Option<&str>,
    artifact_type: &str,
) -> String {
    match classifier.filter(|c| !c.is_empty()) {
        Some(c) => format!("{}:{}:{}:{}", group_id, artifact_id, c, artifact_type),
        None => format!("{}:{}:{}", group_id, artifact_id, artifact_type),
    }
}

/// Identifies a project-level metadata document (unversioned).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub group_id: String,
    pub artifact_id: String,
}

impl ProjectReference {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }
}

impl fmt::Display for ProjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// Identifies per-version metadata, used for snapshot resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedReference {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl VersionedReference {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }

    pub fn project(&self) -> ProjectReference {
        ProjectReference::new(&self.group_id, &self.artifact_id)
    }
}

impl fmt::Display for VersionedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// Either kind of metadata document location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataReference {
    Project(ProjectReference),
    Versioned(VersionedReference),
}

impl MetadataReference {
    pub fn group_id(&self) -> &str {
        match self {
            Self::Project(r) => &r.group_id,
            Self::Versioned(r) => &r.group_id,
        }
    }

    pub fn artifact_id(&self) -> &str {
        match self {
            Self::Project(r) => &r.artifact_id,
            Self::Versioned(r) => &r.artifact_id,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Project(_) => None,
            Self::Versioned(r) => Some(&r.version),
        }
    }
}

impl From<ProjectReference> for MetadataReference {
    fn from(r: ProjectReference) -> Self {
        Self::Project(r)
    }
}

impl From<VersionedReference> for MetadataReference {
    fn from(r: VersionedReference) -> Self {
        Self::Versioned(r)
    }
}

impl fmt::Display for MetadataReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project(r) => r.fmt(f),
            Self::Versioned(r) => r.fmt(f),
        }
    }
}
