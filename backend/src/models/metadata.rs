//! Repository metadata document (`maven-metadata.xml`).

use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Snapshot descriptor of versioned metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotVersion {
    /// `yyyyMMdd.HHmmss`
    pub timestamp: Option<String>,
    pub build_number: u32,
}

impl SnapshotVersion {
    pub fn new(timestamp: impl Into<String>, build_number: u32) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            build_number,
        }
    }
}

/// Merged metadata document for a project or a single version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivaRepositoryMetadata {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub latest_version: Option<String>,
    pub released_version: Option<String>,
    pub snapshot_version: Option<SnapshotVersion>,
    pub available_versions: Vec<String>,
    /// `yyyyMMddHHmmss`
    pub last_updated: Option<String>,
}

// Wire shape of maven-metadata.xml, as read by quick-xml.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawMetadata {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    versioning: Option<RawVersioning>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawVersioning {
    latest: Option<String>,
    release: Option<String>,
    snapshot: Option<RawSnapshot>,
    versions: Option<RawVersions>,
    last_updated: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSnapshot {
    timestamp: Option<String>,
    build_number: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVersions {
    version: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ArchivaRepositoryMetadata {
    /// Parse a `maven-metadata.xml` document.
    pub fn from_xml(content: &str) -> Result<Self> {
        let raw: RawMetadata = quick_xml::de::from_str(content)?;
        let versioning = raw.versioning.unwrap_or_default();

        let snapshot_version = versioning.snapshot.and_then(|s| {
            let timestamp = non_blank(s.timestamp);
            if timestamp.is_none() && s.build_number.is_none() {
                None
            } else {
                Some(SnapshotVersion {
                    timestamp,
                    build_number: s.build_number.unwrap_or(0),
                })
            }
        });

        Ok(Self {
            group_id: non_blank(raw.group_id),
            artifact_id: non_blank(raw.artifact_id),
            version: non_blank(raw.version),
            latest_version: non_blank(versioning.latest),
            released_version: non_blank(versioning.release),
            snapshot_version,
            available_versions: versioning
                .versions
                .map(|v| {
                    v.version
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            last_updated: non_blank(versioning.last_updated),
        })
    }

    /// Parse raw bytes, rejecting non UTF-8 content.
    pub fn from_bytes(content: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(content)
            .map_err(|e| AppError::Validation(format!("Invalid UTF-8 in metadata: {}", e)))?;
        Self::from_xml(text)
    }

    fn has_versioning(&self) -> bool {
        self.latest_version.is_some()
            || self.released_version.is_some()
            || self.snapshot_version.is_some()
            || !self.available_versions.is_empty()
            || self.last_updated.is_some()
    }

    /// Render the document as `maven-metadata.xml`.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n");

        let mut element = |indent: &str, name: &str, value: &Option<String>| {
            if let Some(v) = value {
                xml.push_str(&format!("{}<{}>{}</{}>\n", indent, name, escape(v.as_str()), name));
            }
        };
        element("  ", "groupId", &self.group_id);
        element("  ", "artifactId", &self.artifact_id);
        element("  ", "version", &self.version);

        if self.has_versioning() {
            xml.push_str("  <versioning>\n");
            if let Some(latest) = &self.latest_version {
                xml.push_str(&format!("    <latest>{}</latest>\n", escape(latest.as_str())));
            }
            if let Some(release) = &self.released_version {
                xml.push_str(&format!("    <release>{}</release>\n", escape(release.as_str())));
            }
            if let Some(snapshot) = &self.snapshot_version {
                xml.push_str("    <snapshot>\n");
                if let Some(ts) = &snapshot.timestamp {
                    xml.push_str(&format!("      <timestamp>{}</timestamp>\n", escape(ts.as_str())));
                }
                xml.push_str(&format!(
                    "      <buildNumber>{}</buildNumber>\n",
                    snapshot.build_number
                ));
                xml.push_str("    </snapshot>\n");
            }
            if !self.available_versions.is_empty() {
                xml.push_str("    <versions>\n");
                for v in &self.available_versions {
                    xml.push_str(&format!("      <version>{}</version>\n", escape(v.as_str())));
                }
                xml.push_str("    </versions>\n");
            }
            if let Some(updated) = &self.last_updated {
                xml.push_str(&format!(
                    "    <lastUpdated>{}</lastUpdated>\n",
                    escape(updated.as_str())
                ));
            }
            xml.push_str("  </versioning>\n");
        }

        xml.push_str("</metadata>\n");
        xml
    }
}
