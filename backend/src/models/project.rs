//! Canonical in-memory project descriptor used for ancestry merging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::reference::{versionless_key, VersionedReference};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArchivaProjectModel {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub packaging: Option<String>,
    pub parent_project: Option<VersionedReference>,
    pub ci_management: Option<CiManagement>,
    pub issue_management: Option<IssueManagement>,
    pub organization: Option<Organization>,
    pub scm: Option<Scm>,
    pub individuals: Vec<Individual>,
    pub dependencies: Vec<Dependency>,
    pub dependency_management: Vec<Dependency>,
    pub licenses: Vec<License>,
    pub repositories: Vec<ProjectRepository>,
    pub plugins: Vec<PluginReference>,
    pub reports: Vec<PluginReference>,
    pub mailing_lists: Vec<MailingList>,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiManagement {
    pub system: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueManagement {
    pub system: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Organization {
    pub name: Option<String>,
    pub url: Option<String>,
    pub favicon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scm {
    pub connection: Option<String>,
    pub developer_connection: Option<String>,
    pub url: Option<String>,
}

/// A developer or contributor. Merged by equality, not by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Individual {
    pub principal: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub organization: Option<String>,
    pub organization_url: Option<String>,
    pub url: Option<String>,
    pub timezone: Option<String>,
    pub roles: Vec<String>,
    pub commitor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    pub dependency_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub system_path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub optional: bool,
    /// Set when the dependency was inherited from an ancestor
    #[serde(default)]
    pub from_parent: bool,
    #[serde(default)]
    pub exclusions: Vec<Exclusion>,
}

fn default_type() -> String {
    "jar".to_string()
}

impl Dependency {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
            classifier: None,
            dependency_type: default_type(),
            scope: None,
            system_path: None,
            url: None,
            optional: false,
            from_parent: false,
            exclusions: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn key(&self) -> String {
        versionless_key(
            &self.group_id,
            &self.artifact_id,
            self.classifier.as_deref(),
            &self.dependency_type,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub from_parent: bool,
}

impl Exclusion {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            from_parent: false,
        }
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct License {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub comments: Option<String>,
}

impl License {
    pub fn key(&self) -> String {
        format!(
            "{}:{}",
            self.name.as_deref().unwrap_or_default(),
            self.url.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRepository {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default = "default_true")]
    pub releases: bool,
    #[serde(default)]
    pub snapshots: bool,
    #[serde(default)]
    pub plugins: bool,
}

fn default_true() -> bool {
    true
}

/// Build plugin or report plugin coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginReference {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(rename = "type", default = "default_plugin_type")]
    pub plugin_type: String,
    #[serde(default)]
    pub from_parent: bool,
}

fn default_plugin_type() -> String {
    "maven-plugin".to_string()
}

impl PluginReference {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
            classifier: None,
            plugin_type: default_plugin_type(),
            from_parent: false,
        }
    }

    pub fn key(&self) -> String {
        versionless_key(
            &self.group_id,
            &self.artifact_id,
            self.classifier.as_deref(),
            &self.plugin_type,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailingList {
    pub name: Option<String>,
    pub subscribe: Option<String>,
    pub unsubscribe: Option<String>,
    pub post: Option<String>,
    pub archive: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_defaults_from_json() {
        let dep: Dependency =
            serde_json::from_str(r#"{"groupId":"junit","artifactId":"junit"}"#).unwrap();
        assert_eq!(dep.dependency_type, "jar");
        assert!(!dep.optional);
        assert!(!dep.from_parent);
        assert_eq!(dep.key(), "junit:junit:jar");
    }

    #[test]
    fn test_model_deserializes_sparse_document() {
        let model: ArchivaProjectModel = serde_json::from_str(
            r#"{"groupId":"org.example","artifactId":"app","properties":{"a":"1"}}"#,
        )
        .unwrap();
        assert_eq!(model.group_id.as_deref(), Some("org.example"));
        assert!(model.dependencies.is_empty());
        assert_eq!(model.properties.get("a").map(String::as_str), Some("1"));
    }
}
