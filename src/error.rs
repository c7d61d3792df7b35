//! Error types for treekv
//!
//! Provides a unified error type for all store operations. Low-level I/O
//! failures are translated into domain variants at the facade boundary via
//! [`StoreError::from_io`]; anything unmapped is wrapped with operation
//! context, never swallowed.

use std::io;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for treekv operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Path Errors
    // -------------------------------------------------------------------------
    /// Key path escapes the store root or is syntactically malformed
    /// (e.g. trailing separator where a key is required)
    #[error("invalid path \"{path}\": {reason}")]
    Invalid { path: String, reason: String },

    // -------------------------------------------------------------------------
    // Locking Errors
    // -------------------------------------------------------------------------
    /// Non-blocking lock acquisition failed because another holder has it
    #[error("key \"{key}\" is locked")]
    Locked { key: String },

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// Operation targeted an absent path
    #[error("key \"{key}\" does not exist")]
    DoesNotExist { key: String },

    /// Path exists but is a container where a key was required
    #[error("\"{key}\" is not a key")]
    NotAKey { key: String },

    /// A path component that should be a directory is a file instead
    #[error("\"{key}\" is not a container")]
    NotAContainer { key: String },

    // -------------------------------------------------------------------------
    // Traversal Errors
    // -------------------------------------------------------------------------
    /// find() was given a pattern that is not a valid regular expression
    #[error("invalid find pattern: {0}")]
    Pattern(#[from] regex::Error),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// Any other underlying I/O failure, with the key it happened on
    #[error("I/O error on \"{key}\": {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Translate a raw I/O error into its domain variant.
    ///
    /// Mapping (mirrors the errno semantics of the underlying syscalls):
    /// - `NotFound` (ENOENT) → [`StoreError::DoesNotExist`]
    /// - `IsADirectory` (EISDIR) → [`StoreError::NotAKey`]
    /// - `NotADirectory` (ENOTDIR) → [`StoreError::NotAContainer`]
    /// - everything else → [`StoreError::Io`] with the key as context
    pub fn from_io(key: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::DoesNotExist { key: key.to_string() },
            io::ErrorKind::IsADirectory => Self::NotAKey { key: key.to_string() },
            io::ErrorKind::NotADirectory => Self::NotAContainer { key: key.to_string() },
            _ => Self::Io {
                key: key.to_string(),
                source,
            },
        }
    }

    /// Invalid-path constructor
    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_not_found_to_does_not_exist() {
        let err = StoreError::from_io("a/b", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, StoreError::DoesNotExist { key } if key == "a/b"));
    }

    #[test]
    fn maps_is_a_directory_to_not_a_key() {
        let err = StoreError::from_io("a", io::Error::from(io::ErrorKind::IsADirectory));
        assert!(matches!(err, StoreError::NotAKey { key } if key == "a"));
    }

    #[test]
    fn maps_not_a_directory_to_not_a_container() {
        let err = StoreError::from_io("a/b/c", io::Error::from(io::ErrorKind::NotADirectory));
        assert!(matches!(err, StoreError::NotAContainer { key } if key == "a/b/c"));
    }

    #[test]
    fn wraps_everything_else_with_context() {
        let err = StoreError::from_io("k", io::Error::from(io::ErrorKind::PermissionDenied));
        match err {
            StoreError::Io { key, source } => {
                assert_eq!(key, "k");
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
