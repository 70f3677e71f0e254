//! Maven 1 repository layout.
//!
//! Artifacts live at `groupId/<type>s/artifactId-version[-classifier].ext`.
//! Only implicit classifiers are representable (`java-source` carries
//! `sources`, `javadoc` carries `javadoc`), and there is no metadata.

use super::{split_segments, validate_artifact, RepositoryLayout};
use crate::error::{AppError, Result};
use crate::models::reference::{ArtifactReference, MetadataReference};
use crate::models::repository::LayoutType;

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyLayout;

/// File extension used for an artifact type.
pub fn extension_for_type(artifact_type: &str) -> &str {
    match artifact_type {
        "maven-plugin" | "maven-one-plugin" | "ejb" | "ejb-client" | "java-source"
        | "javadoc" | "test-jar" | "uberjar" | "aspect" => "jar",
        "distribution-tgz" => "tar.gz",
        "distribution-zip" => "zip",
        other => other,
    }
}

/// Classifier implied by an artifact type, if any.
pub fn implicit_classifier(artifact_type: &str) -> Option<&'static str> {
    match artifact_type {
        "java-source" => Some("sources"),
        "javadoc" => Some("javadoc"),
        _ => None,
    }
}

/// Split `artifactId-version` at the first `-` followed by a digit.
fn split_artifact_version(stem: &str) -> Option<(&str, &str)> {
    let bytes = stem.as_bytes();
    (1..bytes.len().saturating_sub(1))
        .find(|&i| bytes[i] == b'-' && bytes[i + 1].is_ascii_digit())
        .map(|i| (&stem[..i], &stem[i + 1..]))
}

impl RepositoryLayout for LegacyLayout {
    fn layout_type(&self) -> LayoutType {
        LayoutType::Legacy
    }

    fn to_path(&self, artifact: &ArtifactReference) -> Result<String> {
        validate_artifact(artifact)?;
        let implicit = implicit_classifier(&artifact.artifact_type);
        let classifier = match (artifact.classifier.as_deref(), implicit) {
            (None, implicit) => implicit,
            (Some(given), Some(implicit)) if given == implicit => Some(implicit),
            (Some(given), _) => {
                return Err(AppError::Layout(format!(
                    "Classifier '{}' cannot be expressed for type '{}' in the legacy layout",
                    given, artifact.artifact_type
                )))
            }
        };

        // The filename carries no separator between artifactId and version
        // other than the first `-<digit>`, so only names that split back
        // the same way are representable.
        let stem = format!("{}-{}", artifact.artifact_id, artifact.version);
        let expected = (artifact.artifact_id.as_str(), artifact.version.as_str());
        if split_artifact_version(&stem) != Some(expected) {
            return Err(AppError::Layout(format!(
                "'{}' cannot be split back into artifactId '{}' and version '{}' in the legacy layout",
                stem, artifact.artifact_id, artifact.version
            )));
        }

        let mut path = format!("{}/{}s/{}", artifact.group_id, artifact.artifact_type, stem);
        if let Some(classifier) = classifier {
            path.push('-');
            path.push_str(classifier);
        }
        path.push('.');
        path.push_str(extension_for_type(&artifact.artifact_type));
        Ok(path)
    }

    fn to_metadata_path(&self, reference: &MetadataReference) -> Result<String> {
        Err(AppError::Layout(format!(
            "The legacy layout has no metadata location for '{}'",
            reference
        )))
    }

    fn to_artifact_reference(&self, path: &str) -> Result<ArtifactReference> {
        let parts = split_segments(path)?;
        if parts.len() != 3 {
            return Err(AppError::Layout(format!(
                "Path '{}' does not have the legacy groupId/types/filename shape",
                path
            )));
        }
        let (group_id, type_dir, filename) = (parts[0], parts[1], parts[2]);

        let artifact_type = type_dir
            .strip_suffix('s')
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::Layout(format!("Invalid legacy type directory '{}'", type_dir))
            })?;

        let ext = extension_for_type(artifact_type);
        let mut stem = filename
            .strip_suffix(ext)
            .and_then(|s| s.strip_suffix('.'))
            .ok_or_else(|| {
                AppError::Layout(format!(
                    "Filename '{}' does not carry the '.{}' extension of type '{}'",
                    filename, ext, artifact_type
                ))
            })?;

        let classifier = implicit_classifier(artifact_type);
        if let Some(classifier) = classifier {
            stem = stem
                .strip_suffix(classifier)
                .and_then(|s| s.strip_suffix('-'))
                .ok_or_else(|| {
                    AppError::Layout(format!(
                        "Filename '{}' lacks the '-{}' suffix of type '{}'",
                        filename, classifier, artifact_type
                    ))
                })?;
        }

        let (artifact_id, version) = split_artifact_version(stem).ok_or_else(|| {
            AppError::Layout(format!(
                "Filename '{}' has no recognisable version",
                filename
            ))
        })?;

        Ok(ArtifactReference::new(
            group_id,
            artifact_id,
            version,
            classifier,
            artifact_type,
        ))
    }

    fn to_metadata_reference(&self, path: &str) -> Result<MetadataReference> {
        Err(AppError::Layout(format!(
            "The legacy layout has no metadata documents ('{}')",
            path
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reference::ProjectReference;

    #[test]
    fn test_to_path() {
        let r = ArtifactReference::new("commons-lang", "commons-lang", "2.1", None, "jar");
        assert_eq!(
            LegacyLayout.to_path(&r).unwrap(),
            "commons-lang/jars/commons-lang-2.1.jar"
        );
    }

    #[test]
    fn test_to_path_type_extension_mapping() {
        let r = ArtifactReference::new("org.example", "plugin", "1.0", None, "maven-plugin");
        assert_eq!(
            LegacyLayout.to_path(&r).unwrap(),
            "org.example/maven-plugins/plugin-1.0.jar"
        );
        let r = ArtifactReference::new("org.example", "dist", "1.0", None, "distribution-tgz");
        assert_eq!(
            LegacyLayout.to_path(&r).unwrap(),
            "org.example/distribution-tgzs/dist-1.0.tar.gz"
        );
    }

    #[test]
    fn test_implicit_classifier() {
        let r = ArtifactReference::new("org.example", "foo", "1.0", None, "java-source");
        assert_eq!(
            LegacyLayout.to_path(&r).unwrap(),
            "org.example/java-sources/foo-1.0-sources.jar"
        );
        let parsed = LegacyLayout
            .to_artifact_reference("org.example/java-sources/foo-1.0-sources.jar")
            .unwrap();
        assert_eq!(parsed.classifier.as_deref(), Some("sources"));
        assert_eq!(parsed.artifact_type, "java-source");
    }

    #[test]
    fn test_explicit_classifier_rejected() {
        let r = ArtifactReference::new("org.example", "foo", "1.0", Some("tests"), "jar");
        assert!(matches!(
            LegacyLayout.to_path(&r).unwrap_err(),
            AppError::Layout(_)
        ));
    }

    #[test]
    fn test_metadata_unsupported() {
        let md: MetadataReference = ProjectReference::new("org.example", "foo").into();
        assert!(matches!(
            LegacyLayout.to_metadata_path(&md).unwrap_err(),
            AppError::Layout(_)
        ));
        assert!(LegacyLayout
            .to_metadata_reference("org.example/poms/maven-metadata.xml")
            .is_err());
    }

    #[test]
    fn test_parse_rejects_bad_paths() {
        for bad in [
            "org/example/foo/1.0/foo-1.0.jar",
            "org.example/jars/foo.jar",
            "org.example/jars/foo-1.0.pom",
            "org.example/s/foo-1.0.jar",
        ] {
            assert!(LegacyLayout.to_artifact_reference(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_round_trip() {
        let refs = [
            ArtifactReference::new("commons-lang", "commons-lang", "2.1", None, "jar"),
            ArtifactReference::new("org.example", "foo", "1.0-SNAPSHOT", None, "pom"),
            ArtifactReference::new("org.example", "foo", "1.0-20240102.030405-7", None, "jar"),
            ArtifactReference::new("org.example", "foo", "1.0", Some("javadoc"), "javadoc"),
            ArtifactReference::new("org.example", "dist", "1.0", None, "distribution-zip"),
        ];
        for r in refs {
            let path = LegacyLayout.to_path(&r).unwrap();
            assert_eq!(LegacyLayout.to_artifact_reference(&path).unwrap(), r, "{}", path);
        }
    }

    #[test]
    fn test_ambiguous_artifact_id_rejected() {
        // `foo-2x-1.0` would parse back as artifactId `foo`, version `2x-1.0`
        for r in [
            ArtifactReference::new("org.example", "foo-2x", "1.0", None, "jar"),
            ArtifactReference::new("org.example", "log4j-1.2-api", "2.17.0", None, "jar"),
            ArtifactReference::new("org.example", "foo", "r1234", None, "jar"),
        ] {
            assert!(
                matches!(LegacyLayout.to_path(&r).unwrap_err(), AppError::Layout(_)),
                "{}",
                r.artifact_id
            );
        }

        // Hyphenated ids without a digit after the hyphen stay representable
        let r = ArtifactReference::new("org.example", "foo-bar", "1.0", None, "jar");
        let path = LegacyLayout.to_path(&r).unwrap();
        assert_eq!(path, "org.example/jars/foo-bar-1.0.jar");
        assert_eq!(LegacyLayout.to_artifact_reference(&path).unwrap(), r);
    }
}
