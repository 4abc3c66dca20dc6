//! Error types for the store indexer pipeline.

use store_indexer_repository::SearchIndexError;
use thiserror::Error;

/// Errors that can occur in the store indexer pipeline.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// A collection descriptor is malformed. Raised before any network call.
    #[error("Invalid configuration for '{entity}' ({field}): {message}")]
    Configuration {
        entity: String,
        field: String,
        message: String,
    },

    /// Error fetching records from the content store.
    #[error("Source error: {0}")]
    SourceError(String),

    /// A record could not be turned into a search document.
    #[error("Transform error: {0}")]
    TransformError(String),

    /// Error importing documents into the search engine.
    #[error("Import error: {0}")]
    ImportError(String),

    /// Error managing the target collection.
    #[error("Collection error: {0}")]
    CollectionError(String),

    /// Error from the search engine.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),
}

impl PipelineError {
    /// Create a configuration error naming the entity type and the offending field.
    pub fn configuration(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::SourceError(msg.into())
    }

    /// Create a transform error.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::TransformError(msg.into())
    }

    /// Create an import error.
    pub fn import(msg: impl Into<String>) -> Self {
        Self::ImportError(msg.into())
    }

    /// Create a collection error.
    pub fn collection(msg: impl Into<String>) -> Self {
        Self::CollectionError(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
