use std::io;
use std::path::PathBuf;

/// Every failure the publish pipeline can surface to a caller.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Malformed page id or upload body. Maps to 400.
    #[error("{0}")]
    Validation(String),

    /// No page (or page source) with the requested id. Maps to 404.
    #[error("{0}")]
    NotFound(String),

    /// Credential mismatch on login. Maps to 401.
    #[error("Invalid username or password")]
    Auth,

    #[error("system random source unavailable: {0}")]
    Entropy(getrandom::Error),

    #[error("session error: {0}")]
    Session(String),

    #[error("failed to convert markdown: {0}")]
    Render(String),

    #[error("page directory {0} already exists")]
    IdCollision(String),

    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PublishError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PublishError::Io { context, path: path.into(), source }
    }

    /// True for the failures that are the caller's fault (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, PublishError::Validation(_) | PublishError::NotFound(_) | PublishError::Auth)
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_carries_path() {
        let err = PublishError::io(
            "failed to write raw source file",
            "public/0011223344556677/source.txt",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "failed to write raw source file public/0011223344556677/source.txt: denied");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_errors() {
        assert!(PublishError::Validation("Invalid page ID".to_string()).is_client_error());
        assert!(PublishError::NotFound("Page not found".to_string()).is_client_error());
        assert!(PublishError::Auth.is_client_error());
        assert!(!PublishError::Render("boom".to_string()).is_client_error());
    }
}
