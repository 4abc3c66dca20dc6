//! Source module for the store indexer pipeline.
//!
//! A record source pages raw records out of the content store. Records are
//! untyped JSON; the processors turn them into search documents.

mod rest;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::PipelineError;
use crate::registry::{IdMethod, QueryMethod};

pub use rest::{RestResource, RestSource, StoreClient, StoreConnection};

/// A raw record as delivered by the content store.
pub type RawRecord = Value;

/// Pages records out of the content store for one entity type.
///
/// A source advertises which paging capabilities it implements; descriptors
/// are checked against these before a run starts. The default bodies of the
/// paging methods report the capability as missing.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Name the source is registered under.
    fn name(&self) -> &str;

    /// Whether `fetch_all` is implemented.
    fn supports_single_batch(&self) -> bool {
        false
    }

    /// Whether `query_page` is implemented for `method`.
    fn supports_query(&self, _method: QueryMethod) -> bool {
        false
    }

    /// Whether `resolve_ids` and `fetch_by_ids` are implemented for `method`.
    fn supports_ids(&self, _method: IdMethod) -> bool {
        false
    }

    /// Every record in one call. Used by `single_batch` entity types.
    async fn fetch_all(&self) -> Result<Vec<RawRecord>, PipelineError> {
        Err(PipelineError::source(format!(
            "source '{}' does not support single batch fetches",
            self.name()
        )))
    }

    /// One page (1-based) of records.
    ///
    /// # Returns
    ///
    /// * `Ok(records)` - The page; empty once the source is exhausted
    async fn query_page(
        &self,
        method: QueryMethod,
        _page: usize,
        _batch_size: usize,
    ) -> Result<Vec<RawRecord>, PipelineError> {
        Err(PipelineError::source(format!(
            "source '{}' does not support {}",
            self.name(),
            method
        )))
    }

    /// One page (1-based) of record identifiers.
    async fn resolve_ids(
        &self,
        method: IdMethod,
        _page: usize,
        _batch_size: usize,
    ) -> Result<Vec<String>, PipelineError> {
        Err(PipelineError::source(format!(
            "source '{}' does not support {}",
            self.name(),
            method
        )))
    }

    /// The records for identifiers returned by `resolve_ids`.
    async fn fetch_by_ids(
        &self,
        method: IdMethod,
        _ids: &[String],
    ) -> Result<Vec<RawRecord>, PipelineError> {
        Err(PipelineError::source(format!(
            "source '{}' does not support {}",
            self.name(),
            method
        )))
    }

    /// Whether `fetch_variations` is implemented.
    fn supports_variations(&self) -> bool {
        false
    }

    /// Every variation of a variable product, shaped as product records.
    ///
    /// `parent` is the trimmed record returned by [`variation_parent`].
    async fn fetch_variations(&self, _parent: &RawRecord) -> Result<Vec<RawRecord>, PipelineError> {
        Err(PipelineError::source(format!(
            "source '{}' does not support product variations",
            self.name()
        )))
    }
}

/// Fields a variation inherits from its parent product.
const PARENT_FIELDS: &[&str] = &["id", "name", "slug", "permalink", "categories", "tags"];

/// The parent fields of a variable product, or `None` for any other record.
pub fn variation_parent(record: &RawRecord) -> Option<RawRecord> {
    if record.get("type").and_then(Value::as_str) != Some("variable") {
        return None;
    }
    let object = record.as_object()?;
    let trimmed = PARENT_FIELDS
        .iter()
        .filter_map(|field| object.get(*field).map(|value| (field.to_string(), value.clone())))
        .collect();
    Some(Value::Object(trimmed))
}

/// Named record sources that descriptors can refer to.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn RecordSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under its own name, replacing any previous entry.
    pub fn register(&mut self, source: Arc<dyn RecordSource>) -> &mut Self {
        self.sources.insert(source.name().to_string(), source);
        self
    }

    pub fn with(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RecordSource>> {
        self.sources.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Every REST-backed source of the content store, under its default name.
    pub fn rest(client: Arc<StoreClient>) -> Self {
        let mut registry = Self::new();
        for resource in RestResource::all() {
            registry.register(Arc::new(RestSource::new(client.clone(), *resource)));
        }
        registry
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.sources.keys()).finish()
    }
}
