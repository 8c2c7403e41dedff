//! Error types for container operations.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for container operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Path segment or leaf does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Leaf already exists at a create-once path
    #[error("Entry already exists: {0}")]
    DuplicateEntry(String),

    /// Dictionary or table value outside the allowed type closure
    #[error("Invalid value type at {path}: {reason}")]
    InvalidValueType { path: String, reason: String },

    /// Caller supplied an argument of the wrong shape
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Grid/points data type lock mismatch
    #[error("Data type conflict: container holds {current}, requested {requested}")]
    TypeConflict { current: String, requested: String },

    /// Parallel point arrays of unequal shape
    #[error("Shape mismatch: {name} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Container was already closed
    #[error("Container is closed")]
    Closed,

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid container file: expected magic bytes")]
    InvalidMagic,

    /// Unsupported file format version
    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid block structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Entry bytes could not be decoded
    #[error("Corrupt entry: {0}")]
    Corrupt(String),

    /// Type mismatch when reading typed array data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a corrupt entry error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Create an invalid value type error for the value at `path`.
    pub fn invalid_value(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValueType {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for container operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::ShapeMismatch {
            name: "lats".into(),
            expected: vec![3],
            actual: vec![2],
        };
        let msg = e.to_string();
        assert!(msg.contains("lats"));
        assert!(msg.contains("[3]"));
        assert!(msg.contains("[2]"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_type_conflict_display() {
        let e = Error::TypeConflict {
            current: "grid".into(),
            requested: "points".into(),
        };
        assert_eq!(
            e.to_string(),
            "Data type conflict: container holds grid, requested points"
        );
    }
}
