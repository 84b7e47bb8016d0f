//! Unified error type for the attendance book.
//!
//! Store errors convert transparently; everything else carries enough context to be
//! shown to the actor as a blocking notification.

use thiserror::Error;

/// Every failure the library can surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Input rejected before reaching the store
    #[error("Invalid input: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// The current actor may not perform this action
    #[error("Permission denied: {action}")]
    PermissionDenied {
        /// The action that was attempted
        action: String,
    },

    /// No class with this id
    #[error("Class not found: {id}")]
    ClassNotFound {
        /// Class id
        id: String,
    },

    /// No teacher with this id
    #[error("Teacher not found: {id}")]
    TeacherNotFound {
        /// Teacher id
        id: String,
    },

    /// No student with this id
    #[error("Student not found: {id}")]
    StudentNotFound {
        /// Student id
        id: String,
    },

    /// No attendance record with this id
    #[error("Attendance record not found: {id}")]
    RecordNotFound {
        /// Record id
        id: String,
    },

    /// The record changed between being read and being written
    #[error("Attendance record {id} was changed by someone else")]
    StaleRecord {
        /// Record id
        id: String,
    },

    /// A status string outside the known set
    #[error("Unknown attendance status: {value}")]
    InvalidStatus {
        /// The raw value
        value: String,
    },

    /// A timestamp that is not RFC 3339
    #[error("Malformed timestamp {value}: {reason}")]
    InvalidTimestamp {
        /// The raw value
        value: String,
        /// Parser message
        reason: String,
    },

    /// The blob store refused or failed the upload
    #[error("Upload failed: {message}")]
    Upload {
        /// What went wrong
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for [`Error::PermissionDenied`].
    pub fn denied(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
