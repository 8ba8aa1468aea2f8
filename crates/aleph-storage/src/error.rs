use thiserror::Error;

use aleph_core::error::AlephError;

/// Errors that can occur while persisting recordings.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to create folder {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("write error: {0}")]
    Write(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for AlephError {
    fn from(err: StorageError) -> Self {
        AlephError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_write() {
        let e = StorageError::Write("disk full".to_string());
        assert_eq!(e.to_string(), "write error: disk full");
    }

    #[test]
    fn test_error_display_create_dir() {
        let e = StorageError::CreateDir {
            path: "/ro/unrecognized".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        };
        assert_eq!(
            e.to_string(),
            "failed to create folder /ro/unrecognized: read-only"
        );
    }

    #[test]
    fn test_into_aleph_error() {
        let e: AlephError = StorageError::Write("x".to_string()).into();
        assert!(matches!(e, AlephError::Storage(_)));
    }
}
