//! Error types for StoredDict operations
//!
//! All StoredDict errors are represented by the StoreError enum. Mapping
//! errors (missing key, empty store) and validation errors are raised
//! synchronously; storage errors carry the path of the backing file.

use std::path::PathBuf;

use thiserror::Error;

/// StoredDict error types with detailed context
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Value cannot be represented in the backing file format
    #[error("value for key '{key}' is not serializable: {reason}")]
    NotSerializable {
        /// Key the caller tried to set
        key: String,
        /// Encoder or round-trip failure description
        reason: String,
    },

    /// Key is not present in the dictionary
    #[error("key not found: '{0}'")]
    KeyNotFound(String),

    /// `pop_last` called on an empty dictionary
    #[error("dictionary is empty")]
    EmptyStore,

    /// Writing the backing file failed
    #[error("failed to write {}: {message}", .path.display())]
    StorageWrite {
        /// Backing file (or its temporary sibling)
        path: PathBuf,
        /// Human-readable description
        message: String,
    },

    /// Backing file exists but could not be read or decoded
    #[error("failed to read {}: {message}", .path.display())]
    StorageRead {
        /// Backing file
        path: PathBuf,
        /// Human-readable description
        message: String,
    },

    /// Stored value does not match the type requested by `get_as`
    #[error("value for key '{key}' cannot be decoded: {reason}")]
    Decode {
        /// Key that was read
        key: String,
        /// Deserializer message
        reason: String,
    },

    /// Configuration rejected by `StoreConfig::validate`
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background sync thread is no longer running
    #[error("sync thread is not running")]
    SchedulerStopped,
}

impl StoreError {
    /// Build a `StorageWrite` from an I/O error at `path`.
    pub(crate) fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StoreError::StorageWrite { path: path.into(), message: err.to_string() }
    }

    /// Build a `StorageRead` from an I/O or decode error at `path`.
    pub(crate) fn read(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StoreError::StorageRead { path: path.into(), message: err.to_string() }
    }
}

/// Result type alias for StoredDict operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::StorageWrite {
            path: PathBuf::from("/tmp/md.yml"),
            message: "disk full".into(),
        };

        let display = format!("{}", err);
        assert!(display.contains("/tmp/md.yml"));
        assert!(display.contains("disk full"));

        let err = StoreError::NotSerializable { key: "x".into(), reason: "boom".into() };
        assert_eq!(err.to_string(), "value for key 'x' is not serializable: boom");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StoreError::read("/nonexistent/md.yml", &io_err);

        match err {
            StoreError::StorageRead { path, message } => {
                assert_eq!(path, PathBuf::from("/nonexistent/md.yml"));
                assert!(message.contains("file not found"));
            }
            _ => panic!("Expected StorageRead error"),
        }
    }
}
