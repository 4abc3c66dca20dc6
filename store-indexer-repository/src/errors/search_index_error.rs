//! Search index error types.
//!
//! This module defines the error types that can occur during search index operations.

use thiserror::Error;

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., missing required fields).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to establish connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The call did not complete within its timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Collection, alias or document not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Collection create/retrieve/delete failed.
    #[error("Collection error: {0}")]
    CollectionError(String),

    /// Document import failed as a whole.
    #[error("Import error: {0}")]
    ImportError(String),

    /// Alias read/write failed.
    #[error("Alias error: {0}")]
    AliasError(String),

    /// The engine answered with a non-success status.
    #[error("Unexpected status {status}: {message}")]
    ResponseError { status: u16, message: String },

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a collection error.
    pub fn collection(msg: impl Into<String>) -> Self {
        Self::CollectionError(msg.into())
    }

    /// Create an import error.
    pub fn import(msg: impl Into<String>) -> Self {
        Self::ImportError(msg.into())
    }

    /// Create an alias error.
    pub fn alias(msg: impl Into<String>) -> Self {
        Self::AliasError(msg.into())
    }

    /// Create a response error from an HTTP status and body.
    pub fn response(status: u16, message: impl Into<String>) -> Self {
        Self::ResponseError {
            status,
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ResponseError { status: 404, .. })
    }

    /// Whether retrying the same call may succeed (transient failures).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::Timeout(_) => true,
            Self::ResponseError { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Self::ImportError(msg) | Self::Unknown(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("rate limit")
                    || msg.contains("timeout")
                    || msg.contains("timed out")
                    || msg.contains("connection")
                    || msg.contains("503")
                    || msg.contains("429")
            }
            Self::ValidationError(_)
            | Self::NotFound(_)
            | Self::CollectionError(_)
            | Self::AliasError(_)
            | Self::ParseError(_)
            | Self::BatchSizeExceeded { .. } => false,
        }
    }
}
