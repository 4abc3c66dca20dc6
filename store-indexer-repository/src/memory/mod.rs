//! In-process search backend.
//!
//! Holds collections and aliases in memory. Used for dry runs
//! (`SEARCH_BACKEND=memory`) and as the backend in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{
    AliasInfo, CollectionInfo, DocumentImportResult, ImportAction, ImportSummary,
};
use store_indexer_shared::{CollectionSchema, FieldType, SearchDocument};

#[derive(Debug, Default)]
struct MemoryCollection {
    schema: CollectionSchema,
    documents: BTreeMap<String, SearchDocument>,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeMap<String, MemoryCollection>,
    aliases: HashMap<String, String>,
    alias_writes: usize,
}

impl MemoryState {
    fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// Search backend that keeps everything in process memory.
///
/// Cloning yields a handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents currently stored in `collection` (or the collection behind an alias).
    pub async fn documents(&self, collection: &str) -> Vec<SearchDocument> {
        let state = self.state.lock().await;
        let name = state.resolve(collection);
        state
            .collections
            .get(name)
            .map(|c| c.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn collection_names(&self) -> Vec<String> {
        self.state.lock().await.collections.keys().cloned().collect()
    }

    /// Number of alias writes performed so far.
    pub async fn alias_writes(&self) -> usize {
        self.state.lock().await.alias_writes
    }

    fn missing_required_field(schema: &CollectionSchema, document: &SearchDocument) -> Option<String> {
        schema
            .fields
            .iter()
            .filter(|f| !f.optional && f.field_type != FieldType::Auto && f.name != ".*")
            .filter(|f| f.name != "id")
            .find(|f| document.get(&f.name).is_none())
            .map(|f| f.name.clone())
    }
}

#[async_trait]
impl SearchIndexProvider for InMemoryProvider {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().await;
        if state.collections.contains_key(name) {
            return Err(SearchIndexError::collection(format!(
                "A collection with name `{}` already exists.",
                name
            )));
        }
        state.collections.insert(
            name.to_string(),
            MemoryCollection {
                schema: schema.clone(),
                documents: BTreeMap::new(),
            },
        );
        debug!(collection = %name, "Created in-memory collection");
        Ok(())
    }

    async fn retrieve_collection(&self, name: &str) -> Result<CollectionInfo, SearchIndexError> {
        let state = self.state.lock().await;
        state
            .collections
            .get(name)
            .map(|c| CollectionInfo {
                name: name.to_string(),
                num_documents: Some(c.documents.len() as u64),
            })
            .ok_or_else(|| SearchIndexError::not_found(format!("collection {}", name)))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().await;
        state
            .collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SearchIndexError::not_found(format!("collection {}", name)))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, SearchIndexError> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .iter()
            .map(|(name, c)| CollectionInfo {
                name: name.clone(),
                num_documents: Some(c.documents.len() as u64),
            })
            .collect())
    }

    async fn import_documents(
        &self,
        collection: &str,
        documents: &[SearchDocument],
        action: ImportAction,
    ) -> Result<ImportSummary, SearchIndexError> {
        let mut state = self.state.lock().await;
        let name = state.resolve(collection).to_string();
        let target = state
            .collections
            .get_mut(&name)
            .ok_or_else(|| SearchIndexError::not_found(format!("collection {}", collection)))?;

        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            if let Some(field) = Self::missing_required_field(&target.schema, document) {
                results.push(DocumentImportResult::failed(
                    &document.id,
                    SearchIndexError::import(format!(
                        "Field `{}` has been declared in the schema, but is not found in the document.",
                        field
                    )),
                ));
                continue;
            }

            let exists = target.documents.contains_key(&document.id);
            match action {
                ImportAction::Insert if exists => {
                    results.push(DocumentImportResult::failed(
                        &document.id,
                        SearchIndexError::import("A document with this id already exists."),
                    ));
                }
                ImportAction::Update if !exists => {
                    results.push(DocumentImportResult::failed(
                        &document.id,
                        SearchIndexError::not_found(format!("document {}", document.id)),
                    ));
                }
                ImportAction::Update => {
                    if let Some(existing) = target.documents.get_mut(&document.id) {
                        for (key, value) in &document.fields {
                            existing.fields.insert(key.clone(), value.clone());
                        }
                    }
                    results.push(DocumentImportResult::succeeded(&document.id));
                }
                ImportAction::Insert | ImportAction::Upsert => {
                    target
                        .documents
                        .insert(document.id.clone(), document.clone());
                    results.push(DocumentImportResult::succeeded(&document.id));
                }
            }
        }

        Ok(ImportSummary::from_results(results))
    }

    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().await;
        if !state.collections.contains_key(collection) {
            return Err(SearchIndexError::not_found(format!("collection {}", collection)));
        }
        state
            .aliases
            .insert(alias.to_string(), collection.to_string());
        state.alias_writes += 1;
        Ok(())
    }

    async fn retrieve_alias(&self, alias: &str) -> Result<String, SearchIndexError> {
        let state = self.state.lock().await;
        state
            .aliases
            .get(alias)
            .cloned()
            .ok_or_else(|| SearchIndexError::not_found(format!("alias {}", alias)))
    }

    async fn list_aliases(&self) -> Result<Vec<AliasInfo>, SearchIndexError> {
        let state = self.state.lock().await;
        let mut aliases: Vec<AliasInfo> = state
            .aliases
            .iter()
            .map(|(name, collection_name)| AliasInfo {
                name: name.clone(),
                collection_name: collection_name.clone(),
            })
            .collect();
        aliases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(aliases)
    }

    async fn delete_alias(&self, alias: &str) -> Result<(), SearchIndexError> {
        let mut state = self.state.lock().await;
        state
            .aliases
            .remove(alias)
            .map(|_| ())
            .ok_or_else(|| SearchIndexError::not_found(format!("alias {}", alias)))
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        Ok(true)
    }
}
