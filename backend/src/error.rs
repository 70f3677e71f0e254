//! Application error types and result alias.

use http::StatusCode;
use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    /// A path or reference could not be translated under a repository layout.
    #[error("Layout error: {0}")]
    Layout(String),

    /// Fatal proxy condition that aborts the whole connector loop.
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Top-level project model merge was given missing input.
    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map error variant to HTTP status code and machine-readable error code.
    ///
    /// Used by the serving layer: a proxy error means misconfiguration, so it
    /// becomes a 5xx rather than a 404.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Layout(_) => (StatusCode::BAD_REQUEST, "LAYOUT_ERROR"),
            Self::Proxy(_) => (StatusCode::BAD_GATEWAY, "PROXY_ERROR"),
            Self::Merge(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MERGE_ERROR"),
            Self::Policy(_) => (StatusCode::INTERNAL_SERVER_ERROR, "POLICY_ERROR"),
            Self::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            Self::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::Json(_) => (StatusCode::BAD_REQUEST, "JSON_ERROR"),
            Self::Toml(_) | Self::Yaml(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Xml(_) => (StatusCode::BAD_GATEWAY, "XML_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Return a user-facing message. Internal details are hidden for server-side
    /// errors to avoid leaking file paths, credentials, or config values.
    pub fn user_message(&self) -> String {
        match self {
            // Server-side errors: return generic messages (details are logged)
            Self::Proxy(_) => "Repository proxy is misconfigured".to_string(),
            Self::Merge(_) => "Project model merge failed".to_string(),
            Self::Policy(_) => "Proxy policy is misconfigured".to_string(),
            Self::Config(_) | Self::Toml(_) | Self::Yaml(_) => {
                "Server configuration error".to_string()
            }
            Self::Storage(_) => "Storage operation failed".to_string(),
            Self::Io(_) => "IO operation failed".to_string(),
            Self::Xml(_) => "Invalid metadata document".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            // Client-facing errors: pass through their message
            Self::Layout(msg) | Self::Validation(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Json(_) => "Invalid JSON".to_string(),
        }
    }

    /// Whether this error means the request was misconfigured rather than absent.
    pub fn is_server_side(&self) -> bool {
        self.status_and_code().0.is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Server-side errors: user_message must NOT leak internal details
    // -----------------------------------------------------------------------

    #[test]
    fn test_proxy_error_hides_details() {
        let err = AppError::Proxy("connector internal->central has bad layout".into());
        assert_eq!(err.user_message(), "Repository proxy is misconfigured");
        assert!(!err.user_message().contains("central"));
    }

    #[test]
    fn test_storage_error_hides_details() {
        let err = AppError::Storage("/var/data/repositories/internal/secret.jar".into());
        assert_eq!(err.user_message(), "Storage operation failed");
        assert!(!err.user_message().contains("/var"));
    }

    #[test]
    fn test_config_error_hides_details() {
        let err = AppError::Config("password for remote 'central' is invalid".into());
        assert_eq!(err.user_message(), "Server configuration error");
        assert!(!err.user_message().contains("password"));
    }

    #[test]
    fn test_io_error_hides_details() {
        let err = AppError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "/etc/shadow: permission denied",
        ));
        assert_eq!(err.user_message(), "IO operation failed");
        assert!(!err.user_message().contains("/etc"));
    }

    // -----------------------------------------------------------------------
    // Client-facing errors: user_message passes through
    // -----------------------------------------------------------------------

    #[test]
    fn test_layout_passes_through() {
        let err = AppError::Layout("path has too few segments".into());
        assert_eq!(err.user_message(), "path has too few segments");
    }

    #[test]
    fn test_not_found_passes_through() {
        let err = AppError::NotFound("managed repository 'internal' not found".into());
        assert_eq!(err.user_message(), "managed repository 'internal' not found");
    }

    // -----------------------------------------------------------------------
    // HTTP status codes
    // -----------------------------------------------------------------------

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Layout("x".into()).status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert!(AppError::Proxy("x".into()).is_server_side());
        assert!(AppError::Config("x".into()).is_server_side());
        assert!(!AppError::Layout("x".into()).is_server_side());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Layout("x".into()).status_and_code().1, "LAYOUT_ERROR");
        assert_eq!(AppError::Proxy("x".into()).status_and_code().1, "PROXY_ERROR");
        assert_eq!(AppError::Merge("x".into()).status_and_code().1, "MERGE_ERROR");
    }
}
