//! Error types for icon-detect.
//!
//! Root-level failures ([`Error::StoreUnavailable`], [`Error::Backup`]) abort a
//! run. Per-entry failures ([`Error::EntryRead`], [`Error::EntryWrite`]) are
//! recovered where they happen and only surface in logs and reports.

use std::io;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Failure reported by a key store for a single key operation.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key or value does not exist
    #[error("not found: {path}")]
    NotFound { path: String },

    /// The caller lacks the requested access right
    #[error("access denied: {path}")]
    AccessDenied { path: String },

    /// The key was expected to be absent
    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    /// A non-recursive delete hit a key that still has children
    #[error("key has subkeys: {path}")]
    HasSubkeys { path: String },

    /// The value exists but is not a string
    #[error("value is not a string: {path}")]
    WrongType { path: String },

    /// Any other operating system error code
    #[error("os error {code} on {path}")]
    Os { path: String, code: u32 },
}

impl StoreError {
    pub fn not_found(path: impl Into<String>) -> Self {
        StoreError::NotFound { path: path.into() }
    }

    pub fn access_denied(path: impl Into<String>) -> Self {
        StoreError::AccessDenied { path: path.into() }
    }

    /// True when the key (or value) is simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result of a single key store operation.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The core error type for all icon-detect operations.
#[derive(ThisError, Debug)]
pub enum Error {
    /// The parent key cannot be opened or enumerated
    #[error("Key store unavailable at {path}: {source}")]
    StoreUnavailable {
        path: String,
        #[source]
        source: StoreError,
    },

    /// A single entry could not be opened or read
    #[error("Failed to read entry {name:?}: {source}")]
    EntryRead {
        name: String,
        #[source]
        source: StoreError,
    },

    /// A single entry could not be created, written or deleted
    #[error("Failed to write entry {name:?}: {source}")]
    EntryWrite {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Backup file cannot be created, written or read
    #[error("Backup I/O error at {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Backup file content is malformed
    #[error("Malformed backup at line {line}: {reason}")]
    BackupFormat { line: usize, reason: String },

    /// Invalid configuration
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Process discovery or control failed
    #[error("Process error: {reason}")]
    Process { reason: String },

    /// Desktop notification could not be shown
    #[error("Notification failed: {reason}")]
    Notify { reason: String },

    /// Operation not available on this platform
    #[error("Unsupported: {reason}")]
    Unsupported { reason: String },
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a store unavailable error
    pub fn store_unavailable(path: impl Into<String>, source: StoreError) -> Self {
        Error::StoreUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Create an entry read error
    pub fn entry_read(name: impl Into<String>, source: StoreError) -> Self {
        Error::EntryRead {
            name: name.into(),
            source,
        }
    }

    /// Create an entry write error
    pub fn entry_write(name: impl Into<String>, source: StoreError) -> Self {
        Error::EntryWrite {
            name: name.into(),
            source,
        }
    }

    /// Create a backup I/O error
    pub fn backup(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Backup {
            path: path.into(),
            source,
        }
    }

    /// Create a backup format error
    pub fn backup_format(line: usize, reason: impl Into<String>) -> Self {
        Error::BackupFormat {
            line,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// Create a process error
    pub fn process(reason: impl Into<String>) -> Self {
        Error::Process {
            reason: reason.into(),
        }
    }

    /// Create a notification error
    pub fn notify(reason: impl Into<String>) -> Self {
        Error::Notify {
            reason: reason.into(),
        }
    }

    /// Create an unsupported-platform error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Error::Unsupported {
            reason: reason.into(),
        }
    }
}
