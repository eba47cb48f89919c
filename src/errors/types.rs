//! Error type definitions for the persistence facade
//!
//! This module defines all error types used throughout the crate,
//! providing a hierarchical error system that keeps the origin of a failure
//! visible to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type returned by every facade operation
#[derive(Error, Debug)]
pub enum ContextError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Typed value codec errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Migration errors raised while building a context
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The worker task running the operation panicked or was cancelled
    #[error("Worker error: {message}")]
    Worker { message: String },

    /// Failure raised by a caller-supplied operation
    #[error("Operation failed: {message}")]
    Operation { message: String },

    /// The context was shut down before the operation was submitted
    #[error("Database context is shut down")]
    ShutDown,
}

/// Migration runner specific errors
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Reading the migration directory or a script failed
    #[error("Failed to read migrations at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Script file name does not follow `<version>__<description>.sql`
    #[error("Invalid migration script name: {name}")]
    InvalidScriptName { name: String },

    /// Two scripts share the same version
    #[error("Duplicate migration version: {version}")]
    DuplicateVersion { version: String },

    /// An already applied script was modified afterwards
    #[error("Checksum mismatch for migration {version}: applied {applied}, found {found}")]
    ChecksumMismatch {
        version: String,
        applied: String,
        found: String,
    },

    /// A statement of a script failed; the script was rolled back
    #[error("Migration {version} failed: {source}")]
    ScriptFailed {
        version: String,
        #[source]
        source: sea_orm::DbErr,
    },

    /// Database errors outside of script execution (tracking table, transactions)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Typed value codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The serializer rejected the value
    #[error("Failed to serialize {type_name}: {message}")]
    Serialize { type_name: String, message: String },

    /// The stored string could not be turned back into the typed value
    #[error("Failed to deserialize {type_name}: {message}")]
    Deserialize { type_name: String, message: String },
}

/// Convenience methods for creating common error types
impl ContextError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an operation error, typically from inside a custom transaction
    pub fn operation<S: Into<String>>(message: S) -> Self {
        Self::Operation {
            message: message.into(),
        }
    }

    /// Create a worker error from a failed join of the spawned task
    pub fn worker(error: tokio::task::JoinError) -> Self {
        if error.is_panic() {
            Self::panicked(error.into_panic())
        } else {
            Self::Worker {
                message: "operation was cancelled".to_string(),
            }
        }
    }

    /// Create a worker error from a caught panic payload
    pub fn panicked(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            format!("operation panicked: {text}")
        } else if let Some(text) = payload.downcast_ref::<String>() {
            format!("operation panicked: {text}")
        } else {
            "operation panicked".to_string()
        };
        Self::Worker { message }
    }

    /// Whether this error originated in the database driver
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl MigrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl CodecError {
    pub fn serialize<T: Into<String>, M: std::fmt::Display>(type_name: T, message: M) -> Self {
        Self::Serialize {
            type_name: type_name.into(),
            message: message.to_string(),
        }
    }

    pub fn deserialize<T: Into<String>, M: std::fmt::Display>(type_name: T, message: M) -> Self {
        Self::Deserialize {
            type_name: type_name.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn worker_error_carries_panic_message() {
        let handle = tokio::spawn(async { panic!("boom") });
        let error = ContextError::worker(handle.await.unwrap_err());
        assert_eq!(
            error.to_string(),
            "Worker error: operation panicked: boom"
        );
    }

    #[test]
    fn codec_error_display_names_the_type() {
        let error = CodecError::deserialize("u32", "invalid digit found in string");
        assert_eq!(
            error.to_string(),
            "Failed to deserialize u32: invalid digit found in string"
        );
    }
}
