//! Proxy fetch orchestration.
//!
//! Walks a managed repository's connectors in order and fetches the
//! requested resource from the first remote repository that can provide
//! it. Transport and policy failures only skip the current connector;
//! misconfiguration aborts the fetch with [`AppError::Proxy`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::layout::{self, PathKind};
use crate::models::proxy_connector::{PolicySettings, ProxyConnector};
use crate::models::reference::{ArtifactReference, MetadataReference};
use crate::models::repository::{RemoteRepository, RepositoryReference};
use crate::policies::{
    default_pre_download_policies, ChecksumPolicy, PolicyRequest, PostDownloadPolicy,
    PreDownloadPolicy, UrlFailureCache,
};
use crate::services::checksum_service::{checksum_path, ChecksumAlgorithm};
use crate::services::connector_resolver::ConnectorResolver;
use crate::services::metadata_service;
use crate::services::metrics_service::{self, FetchOutcome};
use crate::storage::ManagedRepositoryContent;
use crate::transfer::{self, StagingArea, TransferClients, TransferOutcome, TransferSession};

/// Number of destination lock stripes.
const LOCK_STRIPES: usize = 64;

/// What is being fetched.
#[derive(Debug, Clone, Copy)]
enum Resource<'a> {
    Artifact(&'a ArtifactReference),
    Metadata(&'a MetadataReference),
    Path(&'a str),
}

impl Resource<'_> {
    /// Snapshot requests are governed by the snapshots policy; metadata and
    /// plain paths fall under releases.
    fn is_snapshot(&self) -> bool {
        match self {
            Self::Artifact(artifact) => artifact.is_snapshot(),
            Self::Metadata(_) | Self::Path(_) => false,
        }
    }

    /// Update, failure and checksum policies apply to artifacts and
    /// metadata only.
    fn applies_policies(&self) -> bool {
        !matches!(self, Self::Path(_))
    }

    fn remote_path(&self, target: &RemoteRepository) -> Result<String> {
        let layout = layout::for_type(target.layout);
        let rendered = match self {
            Self::Artifact(artifact) => layout.to_path(artifact),
            Self::Metadata(reference) => layout.to_metadata_path(reference),
            Self::Path(path) => return Ok(path.trim_start_matches('/').to_string()),
        };
        rendered.map_err(|e| {
            AppError::Proxy(format!(
                "Cannot translate request for remote repository '{}': {}",
                target.id, e
            ))
        })
    }

    /// Local destination for a resource fetched from `target`. Remote
    /// metadata is kept per remote repository and merged afterwards.
    fn local_file(&self, content: &ManagedRepositoryContent, target: &RemoteRepository) -> Result<PathBuf> {
        match self {
            Self::Artifact(artifact) => content.artifact_file(artifact),
            Self::Metadata(reference) => {
                let path = content.metadata_path(reference)?;
                content.to_file(&layout::proxied_metadata_path(&path, &target.id))
            }
            Self::Path(path) => content.to_file(path),
        }
    }
}

/// Result of one connector attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// The remote provided the resource (or confirmed the local copy).
    Found,
    /// Policy declined a refresh but a local copy exists.
    LocalHit,
    Skipped,
}

/// Fetches resources for managed repositories through their proxy
/// connectors.
pub struct ProxyService {
    resolver: Arc<ConnectorResolver>,
    clients: TransferClients,
    pre_download: Vec<Box<dyn PreDownloadPolicy>>,
    checksum: ChecksumPolicy,
    failures: Arc<UrlFailureCache>,
    locks: Vec<Mutex<()>>,
}

impl ProxyService {
    pub fn new(
        resolver: Arc<ConnectorResolver>,
        clients: TransferClients,
        failures: Arc<UrlFailureCache>,
    ) -> Self {
        Self {
            resolver,
            clients,
            pre_download: default_pre_download_policies(failures.clone()),
            checksum: ChecksumPolicy,
            failures,
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn resolver(&self) -> &Arc<ConnectorResolver> {
        &self.resolver
    }

    /// Connectors configured for `repository`, in evaluation order.
    pub fn get_proxy_connectors(&self, repository: &RepositoryReference) -> Arc<Vec<ProxyConnector>> {
        self.resolver.get_connectors(repository.id())
    }

    pub fn has_proxies(&self, repository: &RepositoryReference) -> bool {
        self.resolver.has_proxies(repository.id())
    }

    /// Fetch an artifact into `repository`. Returns whether it is now
    /// available locally from a proxy.
    pub async fn fetch_artifact(
        &self,
        repository: &RepositoryReference,
        artifact: &ArtifactReference,
    ) -> Result<bool> {
        let content = managed_content(repository)?;
        // Surface a bad managed layout before any connector is tried.
        content.artifact_path(artifact)?;
        Ok(self
            .fetch_from_proxies(&content, Resource::Artifact(artifact))
            .await?
            .is_some())
    }

    /// Fetch a project or versioned metadata document from the first
    /// connector that has it, then rebuild the merged local document.
    pub async fn fetch_metadata(
        &self,
        repository: &RepositoryReference,
        reference: &MetadataReference,
    ) -> Result<bool> {
        let content = managed_content(repository)?;
        content.metadata_path(reference)?;
        if self
            .fetch_from_proxies(&content, Resource::Metadata(reference))
            .await?
            .is_none()
        {
            return Ok(false);
        }

        // Rebuilds of one document are serialised so sidecars match it.
        let merged = content.metadata_file(reference)?;
        let _guard = self.lock_for(&merged).lock().await;
        if let Err(e) = metadata_service::update_metadata(&content, reference).await {
            tracing::warn!(
                repository = %content.id(),
                reference = %reference,
                "Failed to update merged metadata: {}",
                e
            );
        }
        Ok(true)
    }

    /// Fetch an arbitrary repository-relative resource. Only white and
    /// black lists apply.
    pub async fn fetch_path(&self, repository: &RepositoryReference, path: &str) -> Result<bool> {
        let content = managed_content(repository)?;
        content.to_file(path)?;
        Ok(self
            .fetch_from_proxies(&content, Resource::Path(path))
            .await?
            .is_some())
    }

    /// Classify `path` under the repository layout and fetch it as an
    /// artifact, a metadata document or a plain resource.
    pub async fn fetch_resource(&self, repository: &RepositoryReference, path: &str) -> Result<bool> {
        let content = managed_content(repository)?;
        match layout::classify_path(content.layout(), path) {
            PathKind::Artifact(artifact) => self.fetch_artifact(repository, &artifact).await,
            PathKind::Metadata(reference) => self.fetch_metadata(repository, &reference).await,
            PathKind::Checksum => {
                // Sidecars travel with their artifact.
                let base = path.rsplit_once('.').map(|(base, _)| base).unwrap_or(path);
                if let PathKind::Artifact(artifact) = layout::classify_path(content.layout(), base) {
                    if self.fetch_artifact(repository, &artifact).await? {
                        let sidecar = content.to_file(path)?;
                        return Ok(tokio::fs::try_exists(&sidecar).await.unwrap_or(false));
                    }
                    return Ok(false);
                }
                self.fetch_path(repository, path).await
            }
            PathKind::Other => self.fetch_path(repository, path).await,
        }
    }

    /// Try each connector in order; returns the id of the remote repository
    /// that satisfied the request.
    async fn fetch_from_proxies(
        &self,
        content: &ManagedRepositoryContent,
        resource: Resource<'_>,
    ) -> Result<Option<String>> {
        let connectors = self.resolver.get_connectors(content.id());
        if connectors.is_empty() {
            tracing::debug!(repository = %content.id(), "No proxy connectors configured");
            return Ok(None);
        }

        for connector in connectors.iter() {
            let remote_path = resource.remote_path(&connector.target)?;
            let local_file = resource.local_file(content, &connector.target)?;

            match self
                .attempt(connector, resource, &remote_path, &local_file)
                .await?
            {
                Attempt::Found | Attempt::LocalHit => {
                    return Ok(Some(connector.target_repo_id().to_string()));
                }
                Attempt::Skipped => continue,
            }
        }

        tracing::debug!(
            repository = %content.id(),
            "No proxy connector provided the requested resource"
        );
        Ok(None)
    }

    async fn attempt(
        &self,
        connector: &ProxyConnector,
        resource: Resource<'_>,
        remote_path: &str,
        local_file: &Path,
    ) -> Result<Attempt> {
        let label = connector_label(connector);
        let repository = connector.source_repo_id();
        let url = connector.target.resource_url(remote_path);
        let request = PolicyRequest {
            url: &url,
            snapshot: resource.is_snapshot(),
            local_file,
        };

        if resource.applies_policies() && !self.pre_download_allows(connector, &request).await {
            if tokio::fs::try_exists(local_file).await.unwrap_or(false) {
                tracing::debug!(
                    repository = %repository,
                    connector = %label,
                    path = %remote_path,
                    "Refresh declined by policy, using local copy"
                );
                metrics_service::record_fetch(repository, &label, FetchOutcome::SkippedByPolicy);
                return Ok(Attempt::LocalHit);
            }
            metrics_service::record_fetch(repository, &label, FetchOutcome::SkippedByPolicy);
            return Ok(Attempt::Skipped);
        }

        if !connector.white_list.is_empty() && !matches_any(&connector.white_list, remote_path) {
            tracing::debug!(
                repository = %repository,
                connector = %label,
                path = %remote_path,
                "Path not in connector whitelist, skipping"
            );
            metrics_service::record_fetch(repository, &label, FetchOutcome::SkippedByList);
            return Ok(Attempt::Skipped);
        }
        if matches_any(&connector.black_list, remote_path) {
            tracing::debug!(
                repository = %repository,
                connector = %label,
                path = %remote_path,
                "Path in connector blacklist, skipping"
            );
            metrics_service::record_fetch(repository, &label, FetchOutcome::SkippedByList);
            return Ok(Attempt::Skipped);
        }

        let session = match self.connect(connector).await {
            Some(session) => session,
            None => {
                metrics_service::record_fetch(repository, &label, FetchOutcome::TransferFailed);
                return Ok(Attempt::Skipped);
            }
        };

        let _guard = self.lock_for(local_file).lock().await;
        self.transfer_and_promote(connector, resource, session.as_ref(), remote_path, &request)
            .await
    }

    /// Run the update and failure policies. An invalid setting counts as a
    /// refusal.
    async fn pre_download_allows(&self, connector: &ProxyConnector, request: &PolicyRequest<'_>) -> bool {
        for policy in &self.pre_download {
            let setting = policy_setting(&connector.policies, policy.id())
                .unwrap_or_else(|| policy.default_option());
            match policy.apply(setting, request).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(
                        connector = %connector_label(connector),
                        policy = policy.id(),
                        setting = %setting,
                        url = %request.url,
                        "Fetch declined by policy"
                    );
                    return false;
                }
                Err(e) => {
                    tracing::warn!(
                        connector = %connector_label(connector),
                        policy = policy.id(),
                        "Policy could not be evaluated: {}",
                        e
                    );
                    return false;
                }
            }
        }
        true
    }

    async fn connect(&self, connector: &ProxyConnector) -> Option<Box<dyn TransferSession>> {
        let target = &connector.target;
        let client = match self.clients.for_protocol(&target.protocol()) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(remote = %target.id, url = %target.url, "{}", e);
                return None;
            }
        };

        match client.connect(target, connector.network_proxy.as_ref()).await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::info!(
                    remote = %target.id,
                    url = %target.url,
                    "Could not connect to remote repository: {}",
                    e
                );
                None
            }
        }
    }

    async fn transfer_and_promote(
        &self,
        connector: &ProxyConnector,
        resource: Resource<'_>,
        session: &dyn TransferSession,
        remote_path: &str,
        request: &PolicyRequest<'_>,
    ) -> Result<Attempt> {
        let label = connector_label(connector);
        let repository = connector.source_repo_id();
        let local_file = request.local_file;
        let parent = local_file.parent().ok_or_else(|| {
            AppError::Internal(format!("{} has no parent directory", local_file.display()))
        })?;
        tokio::fs::create_dir_all(parent).await?;
        let staging = StagingArea::create(parent).await?;
        let file_name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("resource");
        let staged = staging.file(file_name);

        tracing::info!("Fetching from {}: {}", connector.target_repo_id(), request.url);
        let bytes = match transfer::transfer(session, remote_path, &staged, local_file).await {
            Ok(TransferOutcome::NotModified) => {
                tracing::debug!(
                    repository = %repository,
                    connector = %label,
                    path = %remote_path,
                    "Remote copy not newer than local"
                );
                stamp_checked(local_file).await;
                self.failures.remove(request.url);
                metrics_service::record_fetch(repository, &label, FetchOutcome::NotModified);
                return Ok(Attempt::Found);
            }
            Ok(TransferOutcome::Downloaded { bytes }) => bytes,
            Err(e) => {
                tracing::info!(
                    repository = %repository,
                    connector = %label,
                    path = %remote_path,
                    kind = e.kind(),
                    "Transfer failed: {}",
                    e
                );
                if resource.applies_policies() && cache_failures_enabled(&connector.policies) {
                    self.failures.cache_failure(request.url);
                    metrics_service::record_cached_failure(connector.target_repo_id());
                }
                metrics_service::record_fetch(repository, &label, FetchOutcome::TransferFailed);
                return Ok(Attempt::Skipped);
            }
        };

        if resource.applies_policies() {
            for algorithm in ChecksumAlgorithm::ALL {
                let remote_sidecar = format!("{}.{}", remote_path, algorithm.extension());
                if let Err(e) = session.get(&remote_sidecar, &checksum_path(&staged, algorithm)).await {
                    tracing::debug!(path = %remote_sidecar, "No remote checksum: {}", e);
                }
            }

            let staged_request = PolicyRequest {
                local_file: &staged,
                ..*request
            };
            let accepted = match self
                .checksum
                .apply(&connector.policies.checksum, &staged_request)
                .await
            {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(connector = %label, "Checksum policy could not be evaluated: {}", e);
                    false
                }
            };
            if !accepted {
                metrics_service::record_fetch(repository, &label, FetchOutcome::ChecksumFailed);
                return Ok(Attempt::Skipped);
            }
        }

        transfer::promote(&staged, local_file)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to store {}: {}", local_file.display(), e)))?;
        for algorithm in ChecksumAlgorithm::ALL {
            let staged_sidecar = checksum_path(&staged, algorithm);
            let local_sidecar = checksum_path(local_file, algorithm);
            if tokio::fs::try_exists(&staged_sidecar).await.unwrap_or(false) {
                transfer::promote(&staged_sidecar, &local_sidecar)
                    .await
                    .map_err(|e| AppError::Storage(e.to_string()))?;
            } else if resource.applies_policies() {
                // A sidecar of the previous content would no longer match.
                match tokio::fs::remove_file(&local_sidecar).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        stamp_checked(local_file).await;
        self.failures.remove(request.url);
        metrics_service::record_transfer_bytes(connector.target_repo_id(), bytes);
        metrics_service::record_fetch(repository, &label, FetchOutcome::Found);
        tracing::debug!(
            repository = %repository,
            connector = %label,
            path = %remote_path,
            bytes,
            "Stored proxied resource"
        );
        Ok(Attempt::Found)
    }

    fn lock_for(&self, path: &Path) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        &self.locks[(hasher.finish() as usize) % self.locks.len()]
    }
}

async fn stamp_checked(local_file: &Path) {
    if let Err(e) = transfer::mark_checked(local_file).await {
        tracing::warn!(path = %local_file.display(), "Failed to record check time: {}", e);
    }
}

fn managed_content(repository: &RepositoryReference) -> Result<ManagedRepositoryContent> {
    repository
        .as_managed()
        .cloned()
        .map(ManagedRepositoryContent::new)
        .ok_or_else(|| {
            AppError::Proxy(format!(
                "Repository '{}': can only proxy managed repositories",
                repository.id()
            ))
        })
}

fn connector_label(connector: &ProxyConnector) -> String {
    format!("{}->{}", connector.source_repo_id(), connector.target_repo_id())
}

fn policy_setting<'a>(policies: &'a PolicySettings, policy_id: &str) -> Option<&'a str> {
    match policy_id {
        "releases" => Some(&policies.releases),
        "snapshots" => Some(&policies.snapshots),
        "cache-failures" => Some(&policies.cache_failures),
        "checksum" => Some(&policies.checksum),
        _ => None,
    }
}

fn cache_failures_enabled(policies: &PolicySettings) -> bool {
    policies.cache_failures.trim().eq_ignore_ascii_case("yes")
}

/// Translate an Ant-style glob into an anchored regex: `**` spans
/// directories, `*` and `?` stay within one segment.
pub fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.trim().trim_start_matches('/').chars().collect();
    let mut re = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '\\' => re.push('/'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }
    re.push('$');
    re
}

/// Whether `path` matches any of the glob `patterns`.
pub fn matches_any(patterns: &[String], path: &str) -> bool {
    let path = path.trim_start_matches('/');
    patterns.iter().any(|pattern| match Regex::new(&glob_to_regex(pattern)) {
        Ok(re) => re.is_match(path),
        Err(e) => {
            tracing::warn!(pattern = %pattern, "Ignoring invalid path pattern: {}", e);
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigurationSnapshot, RepositoryConfiguration};
    use crate::models::repository::{LayoutType, ManagedRepository};
    use crate::transfer::TransferSettings;
    use std::time::Duration;
    use tempfile::TempDir;

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Glob matching
    // -----------------------------------------------------------------------

    #[test]
    fn test_double_star_spans_directories() {
        let list = patterns(&["com/foo/**"]);
        assert!(matches_any(&list, "com/foo/bar/1.0/bar-1.0.jar"));
        assert!(matches_any(&list, "/com/foo/x.jar"));
        assert!(!matches_any(&list, "org/bar/x.jar"));
        assert!(!matches_any(&list, "com/foobar/x.jar"));
    }

    #[test]
    fn test_single_star_within_segment() {
        let list = patterns(&["org/*/x.jar"]);
        assert!(matches_any(&list, "org/bar/x.jar"));
        assert!(!matches_any(&list, "org/bar/baz/x.jar"));
    }

    #[test]
    fn test_leading_double_star() {
        let list = patterns(&["**/*.pom"]);
        assert!(matches_any(&list, "foo.pom"));
        assert!(matches_any(&list, "org/example/foo/1.0/foo-1.0.pom"));
        assert!(!matches_any(&list, "org/example/foo/1.0/foo-1.0.jar"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let list = patterns(&["org/a+b/**"]);
        assert!(matches_any(&list, "org/a+b/x.jar"));
        assert!(!matches_any(&list, "org/aab/x.jar"));
        assert!(!matches_any(&[], "anything"));
    }

    // -----------------------------------------------------------------------
    // Helpers and preconditions
    // -----------------------------------------------------------------------

    #[test]
    fn test_policy_setting_lookup() {
        let policies = PolicySettings {
            snapshots: "daily".into(),
            ..Default::default()
        };
        assert_eq!(policy_setting(&policies, "snapshots"), Some("daily"));
        assert_eq!(policy_setting(&policies, "releases"), Some("always"));
        assert_eq!(policy_setting(&policies, "unknown"), None);
        assert!(!cache_failures_enabled(&policies));
    }

    fn service() -> ProxyService {
        let resolver = Arc::new(ConnectorResolver::from_snapshot(&ConfigurationSnapshot::new(
            RepositoryConfiguration::default(),
        )));
        ProxyService::new(
            resolver,
            TransferClients::with_defaults(&TransferSettings::default()),
            Arc::new(UrlFailureCache::new(16, Duration::from_secs(60))),
        )
    }

    #[tokio::test]
    async fn test_remote_repository_rejected() {
        let remote = RepositoryReference::Remote(RemoteRepository {
            id: "central".into(),
            name: None,
            url: "https://repo1.maven.org/maven2".into(),
            layout: LayoutType::Default,
            username: None,
            password: None,
            timeout_secs: None,
        });
        let artifact = ArtifactReference::new("org.example", "foo", "1.0", None, "jar");
        let err = service().fetch_artifact(&remote, &artifact).await.unwrap_err();
        assert!(matches!(err, AppError::Proxy(_)));
        assert!(err.to_string().contains("can only proxy managed repositories"));

        let err = service().fetch_path(&remote, "index.txt").await.unwrap_err();
        assert!(matches!(err, AppError::Proxy(_)));
    }

    #[tokio::test]
    async fn test_no_connectors_not_found() {
        let dir = TempDir::new().unwrap();
        let managed = RepositoryReference::Managed(ManagedRepository {
            id: "internal".into(),
            name: None,
            location: dir.path().to_path_buf(),
            layout: LayoutType::Default,
        });
        let svc = service();
        assert!(!svc.has_proxies(&managed));
        assert!(svc.get_proxy_connectors(&managed).is_empty());
        let artifact = ArtifactReference::new("org.example", "foo", "1.0", None, "jar");
        assert!(!svc.fetch_artifact(&managed, &artifact).await.unwrap());
    }

    #[test]
    fn test_lock_stripes_stable_per_path() {
        let svc = service();
        let a = svc.lock_for(Path::new("/repo/a.jar")) as *const _;
        let b = svc.lock_for(Path::new("/repo/a.jar")) as *const _;
        assert_eq!(a, b);
    }
}
