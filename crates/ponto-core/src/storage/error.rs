//! Storage error handling
//!
//! Errors raised by the local queue, the cache store and the credential
//! file. `is_unavailable` separates failures that cost the device its
//! offline capability from ones that only lost a single write.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store could not be opened or created
    #[error("Persistent storage unavailable at '{path}': {reason}")]
    Unavailable { path: PathBuf, reason: String },

    /// A file or directory the store needs could not be used
    #[error("Cannot use '{path}': {source}")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied for '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No space left to write '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A write did not complete; no partial record was left behind
    #[error("Failed to write {what}: {source}")]
    Write {
        what: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Attach `path` to a filesystem error, classifying it by cause
    pub fn from_io(source: io::Error, path: PathBuf) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied { path, source }
        } else if indicates_full_disk(&source) {
            StorageError::DiskFull { path, source }
        } else {
            StorageError::Inaccessible { path, source }
        }
    }

    /// Wrap a failed SQLite write with a description of what was written
    pub fn write(what: impl Into<String>, source: rusqlite::Error) -> Self {
        StorageError::Write {
            what: what.into(),
            source,
        }
    }

    /// Whether offline capability is lost altogether
    ///
    /// Callers degrade to online-only mode when this is true.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable { .. }
                | StorageError::Inaccessible { .. }
                | StorageError::PermissionDenied { .. }
        )
    }

    /// Whether retrying after user action can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::DiskFull { .. }
                | StorageError::PermissionDenied { .. }
                | StorageError::Write { .. }
        )
    }

    /// What the user can do about this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => {
                Some("Free up disk space; events already queued are kept.")
            }
            StorageError::PermissionDenied { .. } => {
                Some("Make the data directory writable by the current user.")
            }
            StorageError::Inaccessible { .. } | StorageError::Unavailable { .. } => Some(
                "Events cannot be saved offline. Set data_dir to a writable location \
                 or stay online while clocking.",
            ),
            StorageError::Write { .. } => Some("The event was not saved. Try again."),
            StorageError::Database(_) | StorageError::Serialization(_) => None,
        }
    }
}

fn indicates_full_disk(error: &io::Error) -> bool {
    let text = error.to_string().to_lowercase();
    ["no space left", "disk full", "quota exceeded", "not enough space"]
        .iter()
        .any(|needle| text.contains(needle))
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
