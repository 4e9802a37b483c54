//! Error taxonomy for the matching/store/apply core
//!
//! Typed errors live here; the CLI edge wraps them with `anyhow` context.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::{Geometry, WindowHandle};

/// A config entry failed required-field or numeric checks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field '{0}' must be a string")]
    NotAString(&'static str),

    #[error("field '{0}' must be a number")]
    NotNumeric(&'static str),

    #[error("width and height must be greater than 0 (got {width}x{height})")]
    NonPositiveDimension { width: i64, height: i64 },

    #[error("config entry must be a JSON object")]
    NotAnObject,
}

/// Durable write of the record collection failed
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize config records: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("a config for '{title}' ({process}) already exists")]
    Duplicate { title: String, process: String },

    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to save configs: {0}")]
    Persist(#[from] PersistError),

    #[error("config index {index} out of range ({len} configs)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {}: {reason}", path.display())]
    InvalidFormat { path: PathBuf, reason: String },
}

/// Failure reported by the OS window layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowSystemError {
    #[error("access denied")]
    AccessDenied,

    #[error("window does not exist")]
    NoSuchWindow,

    #[error("{0}")]
    Other(String),
}

/// Geometry application failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error(
        "permission denied moving window {handle}: the target may be running with elevated \
         privileges or under another user; run window-sizer with the same privileges"
    )]
    PermissionDenied { handle: WindowHandle },

    #[error("window {0} no longer exists")]
    StaleHandle(WindowHandle),

    #[error("failed to move window {handle}: {detail}")]
    Os { handle: WindowHandle, detail: String },

    #[error("invalid geometry {0}: width and height must be greater than 0")]
    InvalidGeometry(Geometry),
}

impl ApplyError {
    /// Classify a backend failure for a specific handle
    pub fn from_system(handle: WindowHandle, err: WindowSystemError) -> Self {
        match err {
            WindowSystemError::AccessDenied => ApplyError::PermissionDenied { handle },
            WindowSystemError::NoSuchWindow => ApplyError::StaleHandle(handle),
            WindowSystemError::Other(detail) => ApplyError::Os { handle, detail },
        }
    }
}

#[derive(Error, Debug)]
pub enum IconError {
    #[error("icon image is empty")]
    EmptyImage,

    #[error("failed to write icon {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode icon: {0}")]
    Encode(#[from] png::EncodingError),
}

/// Errors surfaced by `Manager` operations
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Icon(#[from] IconError),

    #[error("window {handle}: {source}")]
    Window {
        handle: WindowHandle,
        #[source]
        source: WindowSystemError,
    },

    #[error("window enumeration failed: {0}")]
    Enumeration(#[source] WindowSystemError),

    #[error("no open window matches '{title}' ({process})")]
    NoMatchingWindow { title: String, process: String },

    #[error("bulk apply worker panicked")]
    WorkerPanicked,

    #[error("name must not be empty")]
    EmptyName,

    #[error("storage directory {} does not exist", .0.display())]
    StorageDirMissing(PathBuf),

    #[error("failed to prepare storage directory {}: {source}", path.display())]
    StorageDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to save settings: {0}")]
    Settings(String),
}
