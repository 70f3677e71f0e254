//! Metadata fetches through proxy connectors and merged document rebuilds.

mod common;

use artifact_keeper_proxy::config::RepositoryConfiguration;
use artifact_keeper_proxy::models::metadata::ArchivaRepositoryMetadata;
use artifact_keeper_proxy::models::reference::{
    MetadataReference, ProjectReference, VersionedReference,
};
use common::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CENTRAL_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.example</groupId>
  <artifactId>foo</artifactId>
  <versioning>
    <latest>2.0</latest>
    <release>2.0</release>
    <versions>
      <version>1.0</version>
      <version>2.0</version>
    </versions>
    <lastUpdated>20240101000000</lastUpdated>
  </versioning>
</metadata>"#;

fn read_metadata(path: &std::path::Path) -> ArchivaRepositoryMetadata {
    ArchivaRepositoryMetadata::from_bytes(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_project_metadata_fetched_and_merged() {
    let dir = TempDir::new().unwrap();
    let local_jar = dir.path().join("org/example/foo/1.5/foo-1.5.jar");
    std::fs::create_dir_all(local_jar.parent().unwrap()).unwrap();
    std::fs::write(&local_jar, b"local").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maven2/org/example/foo/maven-metadata.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CENTRAL_METADATA))
        .mount(&server)
        .await;

    let internal = managed("internal", dir.path());
    let svc = service(RepositoryConfiguration {
        managed_repositories: vec![internal.clone()],
        remote_repositories: vec![remote("central", &format!("{}/maven2", server.uri()))],
        proxy_connectors: vec![connector("internal", "central", 0)],
        network_proxies: vec![],
    });

    let project: MetadataReference = ProjectReference::new("org.example", "foo").into();
    assert!(svc.fetch_metadata(&reference(&internal), &project).await.unwrap());

    let proxied = dir.path().join("org/example/foo/maven-metadata-central.xml");
    assert_eq!(read_metadata(&proxied).available_versions, vec!["1.0", "2.0"]);

    let merged = read_metadata(&dir.path().join("org/example/foo/maven-metadata.xml"));
    assert_eq!(merged.available_versions, vec!["1.0", "1.5", "2.0"]);
    assert_eq!(merged.latest_version.as_deref(), Some("2.0"));
    assert_eq!(merged.released_version.as_deref(), Some("2.0"));
    assert!(dir.path().join("org/example/foo/maven-metadata.xml.sha1").exists());
}

#[tokio::test]
async fn test_metadata_missing_everywhere() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let internal = managed("internal", dir.path());
    let svc = service(RepositoryConfiguration {
        managed_repositories: vec![internal.clone()],
        remote_repositories: vec![remote("central", &format!("{}/maven2", server.uri()))],
        proxy_connectors: vec![connector("internal", "central", 0)],
        network_proxies: vec![],
    });

    let project: MetadataReference = ProjectReference::new("org.example", "absent").into();
    assert!(!svc.fetch_metadata(&reference(&internal), &project).await.unwrap());
    assert!(!dir.path().join("org/example/absent/maven-metadata.xml").exists());
}

#[tokio::test]
async fn test_versioned_snapshot_metadata_via_fetch_resource() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maven2/org/example/foo/2.0-SNAPSHOT/maven-metadata.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<metadata>
  <groupId>org.example</groupId>
  <artifactId>foo</artifactId>
  <version>2.0-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>20240105.101010</timestamp>
      <buildNumber>4</buildNumber>
    </snapshot>
    <lastUpdated>20240105101010</lastUpdated>
  </versioning>
</metadata>"#,
        ))
        .mount(&server)
        .await;

    let internal = managed("internal", dir.path());
    let svc = service(RepositoryConfiguration {
        managed_repositories: vec![internal.clone()],
        remote_repositories: vec![remote("central", &format!("{}/maven2", server.uri()))],
        proxy_connectors: vec![connector("internal", "central", 0)],
        network_proxies: vec![],
    });

    assert!(svc
        .fetch_resource(
            &reference(&internal),
            "org/example/foo/2.0-SNAPSHOT/maven-metadata.xml"
        )
        .await
        .unwrap());

    let merged = read_metadata(&dir.path().join("org/example/foo/2.0-SNAPSHOT/maven-metadata.xml"));
    let snapshot = merged.snapshot_version.unwrap();
    assert_eq!(snapshot.timestamp.as_deref(), Some("20240105.101010"));
    assert_eq!(snapshot.build_number, 4);
    assert_eq!(merged.version.as_deref(), Some("2.0-SNAPSHOT"));

    let versioned = VersionedReference::new("org.example", "foo", "2.0-SNAPSHOT");
    assert!(svc
        .fetch_metadata(&reference(&internal), &versioned.into())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_concurrent_metadata_fetches_write_consistent_document() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maven2/org/example/foo/maven-metadata.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CENTRAL_METADATA))
        .mount(&server)
        .await;

    let internal = managed("internal", dir.path());
    let svc = service(RepositoryConfiguration {
        managed_repositories: vec![internal.clone()],
        remote_repositories: vec![remote("central", &format!("{}/maven2", server.uri()))],
        proxy_connectors: vec![connector("internal", "central", 0)],
        network_proxies: vec![],
    });

    let repo = reference(&internal);
    let project: MetadataReference = ProjectReference::new("org.example", "foo").into();
    let (a, b, c) = tokio::join!(
        svc.fetch_metadata(&repo, &project),
        svc.fetch_metadata(&repo, &project),
        svc.fetch_metadata(&repo, &project),
    );
    assert!(a.unwrap() && b.unwrap() && c.unwrap());

    let file = dir.path().join("org/example/foo/maven-metadata.xml");
    let merged = read_metadata(&file);
    assert_eq!(merged.available_versions, vec!["1.0", "2.0"]);
    let sidecar = std::fs::read_to_string(dir.path().join("org/example/foo/maven-metadata.xml.sha1")).unwrap();
    assert!(sidecar.starts_with(&sha1_hex(&std::fs::read(&file).unwrap())));

    let leftovers = std::fs::read_dir(dir.path().join("org/example/foo"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".staging-"))
        .count();
    assert_eq!(leftovers, 0);
}
