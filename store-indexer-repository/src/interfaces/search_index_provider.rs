//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (Typesense, OpenSearch, etc.).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::{AliasInfo, CollectionInfo, ImportAction, ImportSummary};
use store_indexer_shared::{CollectionSchema, SearchDocument};

/// Abstracts the underlying search engine (Typesense, OpenSearch, etc.).
///
/// This trait defines the interface for all search index backend implementations. Implementations
/// are injected into `SearchIndexClient` to enable dependency injection and easy testing with
/// in-memory implementations.
///
/// Collections are physical containers of documents; aliases are stable names that resolve to
/// exactly one collection. Every call may block on network I/O and is bounded by the backend's
/// configured timeout.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Short name of the backend, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Create a collection with the given schema.
    ///
    /// # Arguments
    ///
    /// * `name` - The physical collection name
    /// * `schema` - Field layout of the collection
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the collection was created
    /// * `Err(SearchIndexError)` - If the name is taken or the schema is rejected
    async fn create_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<(), SearchIndexError>;

    /// Look up a collection by name.
    ///
    /// # Returns
    ///
    /// * `Ok(CollectionInfo)` - If the collection exists
    /// * `Err(SearchIndexError::NotFound)` - If it doesn't
    async fn retrieve_collection(&self, name: &str) -> Result<CollectionInfo, SearchIndexError>;

    /// Delete a collection and all its documents.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the collection was deleted
    /// * `Err(SearchIndexError::NotFound)` - If it doesn't exist
    async fn delete_collection(&self, name: &str) -> Result<(), SearchIndexError>;

    /// List every collection in the engine.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, SearchIndexError>;

    /// Import a batch of documents into a collection.
    ///
    /// The batch is sent in a single request. Individual documents may be rejected while
    /// the rest are accepted; those rejections are reported in the summary, not as an error.
    ///
    /// # Arguments
    ///
    /// * `collection` - The physical collection (or alias) to write to
    /// * `documents` - The documents to import, each with a non-empty id
    /// * `action` - How existing documents are treated
    ///
    /// # Returns
    ///
    /// * `Ok(ImportSummary)` - Contains aggregate statistics and individual results
    /// * `Err(SearchIndexError)` - If the import fails entirely
    async fn import_documents(
        &self,
        collection: &str,
        documents: &[SearchDocument],
        action: ImportAction,
    ) -> Result<ImportSummary, SearchIndexError>;

    /// Point `alias` at `collection`, creating the alias if needed.
    ///
    /// The switch is a single backend call: readers see either the old or the new
    /// target, never a missing alias.
    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<(), SearchIndexError>;

    /// Resolve an alias to its collection name.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The collection the alias points to
    /// * `Err(SearchIndexError::NotFound)` - If the alias doesn't exist
    async fn retrieve_alias(&self, alias: &str) -> Result<String, SearchIndexError>;

    /// List every alias in the engine.
    async fn list_aliases(&self) -> Result<Vec<AliasInfo>, SearchIndexError>;

    /// Remove an alias. The collection it pointed to is left untouched.
    async fn delete_alias(&self, alias: &str) -> Result<(), SearchIndexError>;

    /// Check whether the engine is reachable and healthy.
    async fn health_check(&self) -> Result<bool, SearchIndexError>;
}
