//! `file://` remote repositories, typically mounted mirrors.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

use super::{set_modified, TransferClient, TransferError, TransferOutcome, TransferSession};
use crate::models::proxy_connector::NetworkProxy;
use crate::models::repository::RemoteRepository;

#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransferClient;

#[async_trait]
impl TransferClient for FileTransferClient {
    fn protocols(&self) -> &'static [&'static str] {
        &["file"]
    }

    async fn connect(
        &self,
        repository: &RemoteRepository,
        _proxy: Option<&NetworkProxy>,
    ) -> Result<Box<dyn TransferSession>, TransferError> {
        let root = url::Url::parse(&repository.url)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| {
                TransferError::Connection(format!("Invalid file URL '{}'", repository.url))
            })?;
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Err(TransferError::Connection(format!(
                "Repository directory {} does not exist",
                root.display()
            )));
        }
        Ok(Box::new(FileSession { root }))
    }
}

struct FileSession {
    root: PathBuf,
}

impl FileSession {
    fn source(&self, remote_path: &str) -> Result<PathBuf, TransferError> {
        let relative = remote_path.trim_start_matches('/');
        if relative.split('/').any(|s| s == "..") {
            return Err(TransferError::Transfer(format!(
                "Refusing path outside repository: {}",
                remote_path
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn copy(&self, source: &Path, destination: &Path, modified: SystemTime) -> Result<TransferOutcome, TransferError> {
        let bytes = tokio::fs::copy(source, destination).await?;
        set_modified(destination, modified).await?;
        Ok(TransferOutcome::Downloaded { bytes })
    }

    async fn source_modified(&self, source: &Path) -> Result<SystemTime, TransferError> {
        match tokio::fs::metadata(source).await {
            Ok(meta) if meta.is_file() => Ok(meta.modified()?),
            Ok(_) => Err(TransferError::ResourceDoesNotExist(source.display().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TransferError::ResourceDoesNotExist(source.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TransferSession for FileSession {
    async fn get(&self, remote_path: &str, destination: &Path) -> Result<TransferOutcome, TransferError> {
        let source = self.source(remote_path)?;
        let modified = self.source_modified(&source).await?;
        self.copy(&source, destination, modified).await
    }

    async fn get_if_newer(
        &self,
        remote_path: &str,
        destination: &Path,
        since: SystemTime,
    ) -> Result<TransferOutcome, TransferError> {
        let source = self.source(remote_path)?;
        let modified = self.source_modified(&source).await?;
        if modified <= since {
            return Ok(TransferOutcome::NotModified);
        }
        self.copy(&source, destination, modified).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::repository::LayoutType;
    use std::time::Duration;
    use tempfile::TempDir;

    fn remote(root: &Path) -> RemoteRepository {
        RemoteRepository {
            id: "mirror".into(),
            name: None,
            url: url::Url::from_directory_path(root).unwrap().to_string(),
            layout: LayoutType::Default,
            username: None,
            password: None,
            timeout_secs: None,
        }
    }

    #[tokio::test]
    async fn test_get_and_get_if_newer() {
        let remote_dir = TempDir::new().unwrap();
        let local_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(remote_dir.path().join("org/foo/1.0")).unwrap();
        std::fs::write(remote_dir.path().join("org/foo/1.0/foo-1.0.jar"), b"jar").unwrap();

        let session = FileTransferClient
            .connect(&remote(remote_dir.path()), None)
            .await
            .unwrap();
        let dest = local_dir.path().join("foo-1.0.jar");
        let outcome = session.get("org/foo/1.0/foo-1.0.jar", &dest).await.unwrap();
        assert_eq!(outcome, TransferOutcome::Downloaded { bytes: 3 });

        let mtime = std::fs::metadata(&dest).unwrap().modified().unwrap();
        let outcome = session
            .get_if_newer("org/foo/1.0/foo-1.0.jar", &dest, mtime)
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::NotModified);

        let outcome = session
            .get_if_newer("org/foo/1.0/foo-1.0.jar", &dest, mtime - Duration::from_secs(10))
            .await
            .unwrap();
        assert!(outcome.is_downloaded());
    }

    #[tokio::test]
    async fn test_missing_file_and_traversal() {
        let remote_dir = TempDir::new().unwrap();
        let local_dir = TempDir::new().unwrap();
        let session = FileTransferClient
            .connect(&remote(remote_dir.path()), None)
            .await
            .unwrap();
        let dest = local_dir.path().join("x");
        assert!(matches!(
            session.get("missing.jar", &dest).await.unwrap_err(),
            TransferError::ResourceDoesNotExist(_)
        ));
        assert!(matches!(
            session.get("../etc/passwd", &dest).await.unwrap_err(),
            TransferError::Transfer(_)
        ));
    }

    #[tokio::test]
    async fn test_connect_requires_existing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        let mut repo = remote(dir.path());
        repo.url = format!("file://{}", missing.display());
        assert!(matches!(
            FileTransferClient.connect(&repo, None).await.err().unwrap(),
            TransferError::Connection(_)
        ));
    }
}
