//! Remote transfer clients and staged file promotion.
//!
//! A [`TransferClient`] is chosen by the remote repository's URL scheme and
//! opens a [`TransferSession`]. Downloads land in a [`StagingArea`] next to
//! the destination and are moved into place with [`promote`].

pub mod file;
pub mod http;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::proxy_connector::NetworkProxy;
use crate::models::repository::RemoteRepository;

pub use self::file::FileTransferClient;
pub use self::http::HttpTransferClient;

/// Transport level failures. These never escape a fetch: the connector is
/// skipped and the next one is tried.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Resource does not exist: {0}")]
    ResourceDoesNotExist(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Short label used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResourceDoesNotExist(_) => "not_found",
            Self::Connection(_) => "connection",
            Self::Authorization(_) => "authorization",
            Self::Transfer(_) => "transfer",
            Self::UnsupportedProtocol(_) => "unsupported_protocol",
            Self::Io(_) => "io",
        }
    }
}

/// Result of a single get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// New content was written to the destination.
    Downloaded { bytes: u64 },
    /// The remote copy is not newer than the local one; nothing was written.
    NotModified,
}

impl TransferOutcome {
    pub fn is_downloaded(&self) -> bool {
        matches!(self, Self::Downloaded { .. })
    }
}

/// Opens sessions against remote repositories of the protocols it serves.
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// URL schemes handled by this client.
    fn protocols(&self) -> &'static [&'static str];

    /// Prepare a session against `repository`, optionally through a network
    /// proxy.
    async fn connect(
        &self,
        repository: &RemoteRepository,
        proxy: Option<&NetworkProxy>,
    ) -> Result<Box<dyn TransferSession>, TransferError>;
}

/// A connected handle to one remote repository.
#[async_trait]
pub trait TransferSession: Send + Sync {
    /// Unconditionally download `remote_path` into `destination`.
    async fn get(&self, remote_path: &str, destination: &Path)
        -> Result<TransferOutcome, TransferError>;

    /// Download `remote_path` only when the remote copy is newer than `since`.
    async fn get_if_newer(
        &self,
        remote_path: &str,
        destination: &Path,
        since: SystemTime,
    ) -> Result<TransferOutcome, TransferError>;
}

/// Settings shared by every transfer client built at startup.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            user_agent: format!("artifact-keeper-proxy/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Protocol to client mapping, built explicitly at startup.
#[derive(Clone, Default)]
pub struct TransferClients {
    clients: HashMap<String, Arc<dyn TransferClient>>,
}

impl TransferClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// `http`, `https` and `file` clients.
    pub fn with_defaults(settings: &TransferSettings) -> Self {
        let mut clients = Self::new();
        clients.register(Arc::new(HttpTransferClient::new(settings.clone())));
        clients.register(Arc::new(FileTransferClient));
        clients
    }

    /// Register a client for every protocol it declares, replacing any
    /// previous client for those protocols.
    pub fn register(&mut self, client: Arc<dyn TransferClient>) {
        for protocol in client.protocols() {
            self.clients.insert(protocol.to_string(), client.clone());
        }
    }

    pub fn for_protocol(&self, protocol: &str) -> Result<Arc<dyn TransferClient>, TransferError> {
        self.clients
            .get(&protocol.to_lowercase())
            .cloned()
            .ok_or_else(|| TransferError::UnsupportedProtocol(protocol.to_string()))
    }

    pub fn protocols(&self) -> Vec<&str> {
        let mut protocols: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        protocols.sort_unstable();
        protocols
    }
}

/// Private directory next to a destination where downloads are written
/// before promotion. Removed with its contents on drop.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Create a fresh staging directory inside `parent`.
    pub async fn create(parent: &Path) -> std::io::Result<Self> {
        let dir = parent.join(format!(".staging-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Staged location for a file name.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.dir.display(), "Failed to remove staging directory: {}", e);
            }
        }
    }
}

/// Fetch `remote_path` into `staged`. When `destination` already exists only
/// newer remote content is downloaded; not-newer is a successful no-op.
pub async fn transfer(
    session: &dyn TransferSession,
    remote_path: &str,
    staged: &Path,
    destination: &Path,
) -> Result<TransferOutcome, TransferError> {
    match tokio::fs::metadata(destination).await {
        Ok(meta) => {
            let since = meta.modified()?;
            session.get_if_newer(remote_path, staged, since).await
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            session.get(remote_path, staged).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Move a staged file over `destination`. Rename replaces the destination
/// atomically; when rename is impossible (e.g. across filesystems) the old
/// destination is deleted and the staged file copied in.
pub async fn promote(staged: &Path, destination: &Path) -> Result<(), TransferError> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Err(rename_err) = tokio::fs::rename(staged, destination).await {
        tracing::debug!(
            staged = %staged.display(),
            destination = %destination.display(),
            "Rename failed ({}), falling back to copy",
            rename_err
        );
        match tokio::fs::remove_file(destination).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::copy(staged, destination).await?;
        if let Err(e) = tokio::fs::remove_file(staged).await {
            tracing::debug!(staged = %staged.display(), "Failed to remove staged file: {}", e);
        }
    }
    Ok(())
}

/// Set a file's modification time, used to mirror the remote timestamp.
pub(crate) async fn set_modified(path: &Path, modified: SystemTime) -> std::io::Result<()> {
    let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    let file = file.into_std().await;
    tokio::task::spawn_blocking(move || file.set_modified(modified))
        .await
        .map_err(std::io::Error::other)?
}

/// Stamp `path` with the current time after it was downloaded or confirmed
/// current. Update policies age the local copy from this stamp, and the next
/// conditional get asks only for content newer than it.
pub async fn mark_checked(path: &Path) -> std::io::Result<()> {
    set_modified(path, SystemTime::now()).await
}
