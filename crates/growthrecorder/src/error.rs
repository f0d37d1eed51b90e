//! Error types for growthrecorder.
//!
//! This module defines all error types used throughout the growthrecorder crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::identity::ValidationErrors;
use crate::workflow::WorkflowState;

/// The main error type for growthrecorder operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Workflow Errors ===
    /// The identity form was rejected.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// A reading could not be obtained from the telemetry source.
    #[error("failed to fetch reading from field {field}: {message}")]
    ReadingFetch {
        /// Telemetry field index that was requested.
        field: u8,
        /// Description of what went wrong.
        message: String,
    },

    /// The QR payload could not be encoded.
    #[error("failed to encode QR code: {0}")]
    Encoding(String),

    /// The record could not be written to the local store.
    #[error("failed to persist record under '{key}': {message}")]
    LocalPersist {
        /// Storage key of the collection.
        key: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The remote table rejected or never received the record.
    #[error("failed to mirror record to table '{table}': {message}")]
    RemoteSink {
        /// Name of the remote table.
        table: String,
        /// Description of what went wrong.
        message: String,
    },

    /// An action was attempted in a state that does not allow it.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        /// The state the workflow was in.
        from: WorkflowState,
        /// The attempted action.
        action: &'static str,
    },

    /// Confirmation is not possible yet.
    #[error("cannot confirm measurement: {reason}")]
    ConfirmBlocked {
        /// Why the confirmation was refused.
        reason: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Network Errors ===
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for growthrecorder operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a reading fetch error for the given field.
    #[must_use]
    pub fn reading_fetch(field: u8, message: impl Into<String>) -> Self {
        Self::ReadingFetch {
            field,
            message: message.into(),
        }
    }

    /// Create a local persistence error.
    #[must_use]
    pub fn local_persist(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LocalPersist {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a remote sink error.
    #[must_use]
    pub fn remote_sink(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteSink {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a confirmation-blocked error.
    #[must_use]
    pub fn confirm_blocked(reason: impl Into<String>) -> Self {
        Self::ConfirmBlocked {
            reason: reason.into(),
        }
    }

    /// Check if this error came from identity form validation.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if the workflow keeps advancing after this error.
    ///
    /// Reading, encoding and remote sink failures narrow the feature set but
    /// never stop a measurement from being saved locally.
    #[must_use]
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::ReadingFetch { .. } | Self::Encoding(_) | Self::RemoteSink { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{FieldError, FormField};

    #[test]
    fn test_error_display() {
        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");

        let err = Error::reading_fetch(2, "connection refused");
        assert_eq!(
            err.to_string(),
            "failed to fetch reading from field 2: connection refused"
        );
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let errors = ValidationErrors::from(vec![
            FieldError::new(FormField::Name, "Name is required"),
            FieldError::new(FormField::ParentName, "Parent name is required"),
        ]);
        let err: Error = errors.into();
        assert!(err.is_validation_error());
        let msg = err.to_string();
        assert!(msg.contains("Name is required"));
        assert!(msg.contains("Parent name is required"));
    }

    #[test]
    fn test_is_degradable() {
        assert!(Error::reading_fetch(1, "timeout").is_degradable());
        assert!(Error::Encoding("data too long".to_string()).is_degradable());
        assert!(Error::remote_sink("measurements", "503").is_degradable());
        assert!(!Error::local_persist("user_measurements", "disk full").is_degradable());
        assert!(!Error::internal("bug").is_degradable());
    }

    #[test]
    fn test_local_persist_display() {
        let err = Error::local_persist("user_measurements", "disk full");
        let msg = err.to_string();
        assert!(msg.contains("user_measurements"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_remote_sink_display() {
        let err = Error::remote_sink("measurements", "status 401");
        let msg = err.to_string();
        assert!(msg.contains("measurements"));
        assert!(msg.contains("status 401"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = Error::InvalidTransition {
            from: WorkflowState::Saved,
            action: "re-fetch readings",
        };
        assert_eq!(err.to_string(), "cannot re-fetch readings while saved");
    }

    #[test]
    fn test_confirm_blocked_display() {
        let err = Error::confirm_blocked("a fetch is still in flight");
        assert!(err.to_string().contains("in flight"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_from_qr_error() {
        let err: Error = qrcode::types::QrError::DataTooLong.into();
        assert!(matches!(err, Error::Encoding(_)));
        assert!(err.to_string().contains("encode QR code"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "storage key must not be empty".to_string(),
        };
        assert!(err.to_string().contains("storage key"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
