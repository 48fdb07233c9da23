//! Error types shared by all blob store variants

use std::fmt;

/// Errors surfaced by blob store operations.
///
/// Absent blobs are not errors: `fetch_*` and `metadata*` return
/// `Ok(None)` for identifiers that do not exist. Only `delete` reports a
/// missing blob as [`StoreError::NotFound`].
#[derive(Debug)]
pub enum StoreError {
    /// A blob already exists under this identifier (no implicit overwrite)
    AlreadyExists(String),
    /// The blob does not exist (delete only)
    NotFound(String),
    /// Disk or filesystem failure
    Io(Box<std::io::Error>),
    /// Transport or HTTP failure
    Network(Box<reqwest::Error>),
    /// The remote end responded, but not in the shape the protocol requires
    Protocol(String),
    /// The operation is not part of this variant's contract; calling it is
    /// a programming error, not a condition to recover from
    Unsupported(&'static str),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AlreadyExists(id) => write!(f, "blob already exists: {}", id),
            StoreError::NotFound(id) => write!(f, "blob not found: {}", id),
            StoreError::Io(err) => write!(f, "IO error: {}", err),
            StoreError::Network(err) => write!(f, "network error: {}", err),
            StoreError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            StoreError::Unsupported(op) => write!(f, "unsupported operation: {}", op),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err.as_ref()),
            StoreError::Network(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Box::new(err))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(Box::new(err))
    }
}

impl StoreError {
    /// True for the not-found variant; used where absence in one tier is
    /// tolerated while other failures must propagate.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
