//! Managed and remote repository models.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Path-naming convention of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    /// Maven 2 layout: `group/path/artifact/version/artifact-version.ext`
    #[default]
    Default,
    /// Maven 1 layout: `group.id/types/artifact-version.ext`
    Legacy,
}

impl LayoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "modern" | "maven2" => Ok(Self::Default),
            "legacy" | "maven1" => Ok(Self::Legacy),
            other => Err(AppError::Layout(format!(
                "Unknown repository layout '{}'",
                other
            ))),
        }
    }
}

/// A locally hosted, writable repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedRepository {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Root directory of the repository on local storage
    pub location: PathBuf,
    #[serde(default)]
    pub layout: LayoutType,
}

/// An upstream repository that managed repositories proxy to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Base URL, e.g. `https://repo1.maven.org/maven2`
    pub url: String,
    #[serde(default)]
    pub layout: LayoutType,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Per-repository transfer timeout; falls back to the process default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl RemoteRepository {
    /// URL scheme of the repository (`http`, `https`, `file`, ...).
    pub fn protocol(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(parsed) => parsed.scheme().to_lowercase(),
            Err(_) => self
                .url
                .split_once("://")
                .map(|(scheme, _)| scheme.to_lowercase())
                .unwrap_or_default(),
        }
    }

    /// Full URL of a repository-relative path.
    pub fn resource_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Identifies either side of a proxy connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryReference {
    Managed(ManagedRepository),
    Remote(RemoteRepository),
}

impl RepositoryReference {
    pub fn id(&self) -> &str {
        match self {
            Self::Managed(r) => &r.id,
            Self::Remote(r) => &r.id,
        }
    }

    pub fn layout(&self) -> LayoutType {
        match self {
            Self::Managed(r) => r.layout,
            Self::Remote(r) => r.layout,
        }
    }

    /// Base location as a string (filesystem path or URL).
    pub fn location(&self) -> String {
        match self {
            Self::Managed(r) => r.location.display().to_string(),
            Self::Remote(r) => r.url.clone(),
        }
    }

    pub fn protocol(&self) -> String {
        match self {
            Self::Managed(_) => "file".to_string(),
            Self::Remote(r) => r.protocol(),
        }
    }

    pub fn as_managed(&self) -> Option<&ManagedRepository> {
        match self {
            Self::Managed(r) => Some(r),
            Self::Remote(_) => None,
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed(_))
    }
}

impl From<ManagedRepository> for RepositoryReference {
    fn from(repo: ManagedRepository) -> Self {
        Self::Managed(repo)
    }
}

impl From<RemoteRepository> for RepositoryReference {
    fn from(repo: RemoteRepository) -> Self {
        Self::Remote(repo)
    }
}
