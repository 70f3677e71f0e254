//! HTTP(S) transfers with reqwest.

use std::path::Path;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;

use super::{set_modified, TransferClient, TransferError, TransferOutcome, TransferSession, TransferSettings};
use crate::models::proxy_connector::NetworkProxy;
use crate::models::repository::RemoteRepository;

pub struct HttpTransferClient {
    settings: TransferSettings,
}

impl HttpTransferClient {
    pub fn new(settings: TransferSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    fn protocols(&self) -> &'static [&'static str] {
        &["http", "https"]
    }

    async fn connect(
        &self,
        repository: &RemoteRepository,
        proxy: Option<&NetworkProxy>,
    ) -> Result<Box<dyn TransferSession>, TransferError> {
        let timeout = repository
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.settings.timeout);

        let mut builder = Client::builder()
            .timeout(timeout)
            .user_agent(self.settings.user_agent.clone());

        builder = match proxy {
            Some(proxy) => {
                let mut network_proxy = reqwest::Proxy::all(proxy.url()).map_err(|e| {
                    TransferError::Connection(format!("Invalid network proxy '{}': {}", proxy.id, e))
                })?;
                if let Some(username) = &proxy.username {
                    network_proxy =
                        network_proxy.basic_auth(username, proxy.password.as_deref().unwrap_or(""));
                }
                builder.proxy(network_proxy)
            }
            // Only configured network proxies are used, never ambient ones
            None => builder.no_proxy(),
        };

        let client = builder.build().map_err(|e| {
            TransferError::Connection(format!(
                "Failed to create HTTP client for '{}': {}",
                repository.id, e
            ))
        })?;

        Ok(Box::new(HttpSession {
            client,
            repository: repository.clone(),
        }))
    }
}

struct HttpSession {
    client: Client,
    repository: RemoteRepository,
}

/// RFC 7231 IMF-fixdate.
fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| SystemTime::from(dt.with_timezone(&Utc)))
}

fn classify_request_error(url: &str, e: reqwest::Error) -> TransferError {
    if e.is_connect() {
        TransferError::Connection(format!("{}: {}", url, e))
    } else if e.is_timeout() {
        TransferError::Transfer(format!("Timed out fetching {}", url))
    } else {
        TransferError::Transfer(format!("{}: {}", url, e))
    }
}

impl HttpSession {
    async fn fetch(
        &self,
        remote_path: &str,
        destination: &Path,
        since: Option<SystemTime>,
    ) -> Result<TransferOutcome, TransferError> {
        let url = self.repository.resource_url(remote_path);
        tracing::debug!(url = %url, conditional = since.is_some(), "Fetching from remote");

        let mut request = self.client.get(&url);
        if let Some(username) = &self.repository.username {
            request = request.basic_auth(username, self.repository.password.as_deref());
        }
        if let Some(since) = since {
            request = request.header(IF_MODIFIED_SINCE, format_http_date(since));
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_request_error(&url, e))?;

        let status = response.status();
        match status {
            StatusCode::NOT_MODIFIED => return Ok(TransferOutcome::NotModified),
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(TransferError::ResourceDoesNotExist(url));
            }
            StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
                return Err(TransferError::Authorization(format!("HTTP {} from {}", status, url)));
            }
            s if !s.is_success() => {
                return Err(TransferError::Transfer(format!("HTTP {} from {}", status, url)));
            }
            _ => {}
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);

        // Servers that ignore If-Modified-Since still tell us their timestamp.
        if let (Some(since), Some(remote)) = (since, last_modified) {
            if remote <= since {
                return Ok(TransferOutcome::NotModified);
            }
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut bytes = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify_request_error(&url, e))?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if let Some(remote) = last_modified {
            set_modified(destination, remote).await?;
        }

        Ok(TransferOutcome::Downloaded { bytes })
    }
}

#[async_trait]
impl TransferSession for HttpSession {
    async fn get(&self, remote_path: &str, destination: &Path) -> Result<TransferOutcome, TransferError> {
        self.fetch(remote_path, destination, None).await
    }

    async fn get_if_newer(
        &self,
        remote_path: &str,
        destination: &Path,
        since: SystemTime,
    ) -> Result<TransferOutcome, TransferError> {
        self.fetch(remote_path, destination, Some(since)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::repository::LayoutType;
    use tempfile::TempDir;
    use wiremock::matchers::{basic_auth, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote(url: &str) -> RemoteRepository {
        RemoteRepository {
            id: "central".into(),
            name: None,
            url: url.into(),
            layout: LayoutType::Default,
            username: None,
            password: None,
            timeout_secs: Some(5),
        }
    }

    async fn session(repo: &RemoteRepository) -> Box<dyn TransferSession> {
        HttpTransferClient::new(TransferSettings::default())
            .connect(repo, None)
            .await
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // HTTP dates
    // -----------------------------------------------------------------------

    #[test]
    fn test_http_date_round_trip() {
        let parsed = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(format_http_date(parsed), "Wed, 21 Oct 2015 07:28:00 GMT");
        assert!(parse_http_date("yesterday").is_none());
    }

    // -----------------------------------------------------------------------
    // Status handling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_downloads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repo/org/foo/1.0/foo-1.0.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("foo-1.0.jar");
        let repo = remote(&format!("{}/repo", server.uri()));
        let outcome = session(&repo)
            .await
            .get("org/foo/1.0/foo-1.0.jar", &dest)
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::Downloaded { bytes: 9 });
        assert_eq!(std::fs::read(&dest).unwrap(), b"jar-bytes");
    }

    #[tokio::test]
    async fn test_missing_resource() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let repo = remote(&server.uri());
        let err = session(&repo)
            .await
            .get("missing.jar", &dir.path().join("missing.jar"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::ResourceDoesNotExist(_)));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let repo = remote(&server.uri());
        let err = session(&repo)
            .await
            .get("secret.jar", &dir.path().join("secret.jar"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_sends_repository_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(basic_auth("deployer", "s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut repo = remote(&server.uri());
        repo.username = Some("deployer".into());
        repo.password = Some("s3cret".into());
        let outcome = session(&repo)
            .await
            .get("x.jar", &dir.path().join("x.jar"))
            .await
            .unwrap();
        assert!(outcome.is_downloaded());
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop a listener so the port is closed
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = TempDir::new().unwrap();
        let repo = remote(&format!("http://127.0.0.1:{}", port));
        let err = session(&repo)
            .await
            .get("x.jar", &dir.path().join("x.jar"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Connection(_)));
    }

    // -----------------------------------------------------------------------
    // Conditional gets
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_if_newer_honours_last_modified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")
                    .set_body_bytes(b"pom".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("foo.pom");
        let repo = remote(&server.uri());
        let session = session(&repo).await;

        let remote_time = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        let outcome = session.get_if_newer("foo.pom", &dest, remote_time).await.unwrap();
        assert_eq!(outcome, TransferOutcome::NotModified);
        assert!(!dest.exists());

        let older = remote_time - Duration::from_secs(60);
        let outcome = session.get_if_newer("foo.pom", &dest, older).await.unwrap();
        assert!(outcome.is_downloaded());
        // Local copy mirrors the remote timestamp
        assert_eq!(std::fs::metadata(&dest).unwrap().modified().unwrap(), remote_time);
    }

    #[tokio::test]
    async fn test_not_modified_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let repo = remote(&server.uri());
        let outcome = session(&repo)
            .await
            .get_if_newer("foo.pom", &dir.path().join("foo.pom"), SystemTime::now())
            .await
            .unwrap();
        assert_eq!(outcome, TransferOutcome::NotModified);
    }
}
