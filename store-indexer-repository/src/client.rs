//! Search index client implementation.
//!
//! This module provides the main client for interacting with the search index.
//! Application code uses this to manage collections and aliases and to import documents.

use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{AliasInfo, CollectionInfo, ImportAction, ImportSummary};
use store_indexer_shared::{CollectionSchema, SearchDocument};

/// The main client for interacting with the search index.
///
/// Wraps a backend provider with request validation and normalizes
/// not-found responses into `Option`/`bool` where callers expect absence.
pub struct SearchIndexClient {
    provider: Box<dyn SearchIndexProvider>,
    config: SearchIndexConfig,
}

impl SearchIndexClient {
    /// Create a new SearchIndexClient with default configuration.
    pub fn new(provider: Box<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            config: SearchIndexConfig::default(),
        }
    }

    /// Create a new SearchIndexClient with custom configuration.
    pub fn with_config(provider: Box<dyn SearchIndexProvider>, config: SearchIndexConfig) -> Self {
        Self { provider, config }
    }

    pub fn backend_name(&self) -> &'static str {
        self.provider.backend_name()
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    fn validate_name(kind: &str, name: &str) -> Result<(), SearchIndexError> {
        if name.trim().is_empty() {
            return Err(SearchIndexError::validation(format!("{} name is required", kind)));
        }
        Ok(())
    }

    /// Create a new collection.
    /// Input: collection name and schema
    /// Output: Result<(), SearchIndexError>
    pub async fn create_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<(), SearchIndexError> {
        Self::validate_name("collection", name)?;
        if schema.fields.is_empty() {
            return Err(SearchIndexError::validation(format!(
                "schema for '{}' declares no fields",
                name
            )));
        }
        self.provider.create_collection(name, schema).await
    }

    /// Look up a collection. Returns `None` if it does not exist.
    pub async fn retrieve_collection(
        &self,
        name: &str,
    ) -> Result<Option<CollectionInfo>, SearchIndexError> {
        Self::validate_name("collection", name)?;
        match self.provider.retrieve_collection(name).await {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool, SearchIndexError> {
        Ok(self.retrieve_collection(name).await?.is_some())
    }

    /// Delete a collection.
    /// Output: `Ok(true)` if it was deleted, `Ok(false)` if it did not exist.
    pub async fn delete_collection(&self, name: &str) -> Result<bool, SearchIndexError> {
        Self::validate_name("collection", name)?;
        match self.provider.delete_collection(name).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>, SearchIndexError> {
        self.provider.list_collections().await
    }

    /// Import a batch of documents into a collection.
    /// Input: collection name, documents, import action
    /// Output: Result<ImportSummary, SearchIndexError>
    ///
    /// Note: Individual rejections are reported in the summary. The batch size
    /// is limited by the configured max_batch_size (default: 1000).
    pub async fn import(
        &self,
        collection: &str,
        documents: &[SearchDocument],
        action: ImportAction,
    ) -> Result<ImportSummary, SearchIndexError> {
        Self::validate_name("collection", collection)?;

        if documents.is_empty() {
            return Ok(ImportSummary::empty());
        }

        self.validate_batch_size(documents.len())?;

        if documents.iter().any(|d| d.id.is_empty()) {
            return Err(SearchIndexError::validation("All documents must have an id"));
        }

        self.provider
            .import_documents(collection, documents, action)
            .await
    }

    /// Resolve an alias. Returns `None` if the alias does not exist.
    pub async fn get_alias(&self, alias: &str) -> Result<Option<String>, SearchIndexError> {
        Self::validate_name("alias", alias)?;
        match self.provider.retrieve_alias(alias).await {
            Ok(collection) => Ok(Some(collection)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Point an alias at a collection in a single backend call.
    pub async fn set_alias(&self, alias: &str, collection: &str) -> Result<(), SearchIndexError> {
        Self::validate_name("alias", alias)?;
        Self::validate_name("collection", collection)?;
        self.provider.upsert_alias(alias, collection).await
    }

    /// Remove an alias.
    /// Output: `Ok(true)` if it was removed, `Ok(false)` if it did not exist.
    pub async fn delete_alias(&self, alias: &str) -> Result<bool, SearchIndexError> {
        Self::validate_name("alias", alias)?;
        match self.provider.delete_alias(alias).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn list_aliases(&self) -> Result<Vec<AliasInfo>, SearchIndexError> {
        self.provider.list_aliases().await
    }

    pub async fn health_check(&self) -> Result<bool, SearchIndexError> {
        self.provider.health_check().await
    }
}
