//! Error types for the QA Base service.
//!
//! This module defines a unified error enum covering the failure categories
//! of the index layer (validation, lookup, persistence, backing store,
//! embedding) plus the ambient configuration and I/O errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for QA Base.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed request input
    #[error("Validation error: {0}")]
    Validation(String),

    /// A record id or index name does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reading or writing a persisted index failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The relational backing store failed or affected no rows
    #[error("Backing store error: {0}")]
    BackingStore(String),

    /// Embedding computation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`AppError`], safe to hand to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
    BackingStore,
    Embedding,
    Config,
    Internal,
}

impl AppError {
    /// Classify this error.
    ///
    /// Raw I/O failures surface from index files, so they count as
    /// persistence failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Persistence(_) | AppError::Io(_) => ErrorKind::Persistence,
            AppError::BackingStore(_) => ErrorKind::BackingStore,
            AppError::Embedding(_) => ErrorKind::Embedding,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Serialization(_) | AppError::Other(_) => ErrorKind::Internal,
        }
    }

    /// True when the error reports a missing record or index.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
