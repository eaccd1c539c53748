//! Storage error types
//!
//! Defines all errors that can occur in the record layer.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while reading or mutating training records
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed input (bad date, negative duration, non-numeric measurement)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Event code outside the fixed DNF/DYN/DYNB/STA set
    #[error("Invalid event: {0} (expected one of DNF, DYN, DYNB, STA)")]
    InvalidEvent(String),

    /// An entry already exists for this date and overwrite was not requested
    #[error("Entry already exists for {0}")]
    DuplicateKey(NaiveDate),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Derived index disagrees with the record store
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl StorageError {
    /// Shorthand for a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for errors caused by bad caller input rather than storage faults
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidEvent(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for StorageError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(io) => StorageError::Io(io),
                other => StorageError::Serialization(format!("{:?}", other)),
            }
        } else {
            StorageError::Serialization(err.to_string())
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StorageError::Lock(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 4).unwrap();
        let err = StorageError::DuplicateKey(date);
        assert_eq!(err.to_string(), "Entry already exists for 2026-02-04");

        let err = StorageError::InvalidEvent("CWT".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid event: CWT (expected one of DNF, DYN, DYNB, STA)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
        assert!(!storage_err.is_validation());
    }

    #[test]
    fn test_validation_classification() {
        assert!(StorageError::validation("bad date").is_validation());
        assert!(StorageError::InvalidEvent("X".into()).is_validation());
        assert!(!StorageError::NotFound("2026-01-01".into()).is_validation());
    }
}
