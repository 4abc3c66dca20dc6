//! Shared fakes for the pipeline integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use store_indexer_pipeline::{
    default_descriptor_specs, validate_collections_configuration, DescriptorSpec, EngineConfig,
    EngineFactory, FeatureFlags, FixedProbe, IdMethod, PipelineError, ProcessorOptions,
    QueryMethod, RecordSource, SourceRegistry, SyncMode, SyncOrchestrator,
};
use store_indexer_repository::{
    AliasInfo, AliasManager, CollectionInfo, ImportAction, ImportSummary, InMemoryProvider,
    SearchIndexClient, SearchIndexError, SearchIndexProvider,
};
use store_indexer_shared::{CollectionSchema, EntityType, SearchDocument};

/// What a scripted source does when asked for a page.
#[derive(Debug, Clone)]
pub enum Script {
    /// Serve these pages, then empty pages.
    Pages(Vec<Vec<Value>>),
    /// Serve the same page forever.
    Endless(Vec<Value>),
    /// Serve the first page, then fail.
    FailAfterFirst(Vec<Value>),
    /// Panic on the first fetch.
    Panic,
}

/// Record source driven by a `Script`. Supports every paging capability.
/// With `variations`, every variable product has two variations.
pub struct ScriptedSource {
    name: String,
    script: Script,
    variations: bool,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(name: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script,
            variations: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_variations(name: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script,
            variations: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn page(&self, page: usize) -> Result<Vec<Value>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Pages(pages) => Ok(pages.get(page - 1).cloned().unwrap_or_default()),
            Script::Endless(records) => Ok(records.clone()),
            Script::FailAfterFirst(records) if page == 1 => Ok(records.clone()),
            Script::FailAfterFirst(_) => Err(PipelineError::source("upstream returned 500")),
            Script::Panic => panic!("source for {} blew up", self.name),
        }
    }

    fn all_records(&self) -> Vec<Value> {
        match &self.script {
            Script::Pages(pages) => pages.concat(),
            Script::Endless(records) | Script::FailAfterFirst(records) => records.clone(),
            Script::Panic => Vec::new(),
        }
    }
}

fn id_of(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_single_batch(&self) -> bool {
        true
    }

    fn supports_query(&self, _method: QueryMethod) -> bool {
        true
    }

    fn supports_ids(&self, _method: IdMethod) -> bool {
        true
    }

    async fn fetch_all(&self) -> Result<Vec<Value>, PipelineError> {
        self.page(1)
    }

    async fn query_page(
        &self,
        _method: QueryMethod,
        page: usize,
        _batch_size: usize,
    ) -> Result<Vec<Value>, PipelineError> {
        self.page(page)
    }

    async fn resolve_ids(
        &self,
        _method: IdMethod,
        page: usize,
        _batch_size: usize,
    ) -> Result<Vec<String>, PipelineError> {
        Ok(self.page(page)?.iter().filter_map(id_of).collect())
    }

    async fn fetch_by_ids(
        &self,
        _method: IdMethod,
        ids: &[String],
    ) -> Result<Vec<Value>, PipelineError> {
        Ok(self
            .all_records()
            .into_iter()
            .filter(|r| id_of(r).is_some_and(|id| ids.contains(&id)))
            .collect())
    }

    fn supports_variations(&self) -> bool {
        self.variations
    }

    async fn fetch_variations(&self, parent: &Value) -> Result<Vec<Value>, PipelineError> {
        let parent_id = parent["id"].as_u64().unwrap_or_default();
        let parent_name = parent["name"].as_str().unwrap_or_default();
        Ok((1..=2)
            .map(|n| {
                json!({
                    "id": parent_id * 100 + n,
                    "name": format!("{parent_name} - {n}"),
                    "type": "variation",
                    "parent_id": parent_id
                })
            })
            .collect())
    }
}

/// Import calls observed by a `CountingProvider`.
#[derive(Debug, Default)]
pub struct ImportLog {
    batches: Mutex<Vec<(String, usize)>>,
}

impl ImportLog {
    pub fn batches(&self) -> Vec<(String, usize)> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

/// In-memory provider that records every import call.
pub struct CountingProvider {
    inner: InMemoryProvider,
    log: Arc<ImportLog>,
}

#[async_trait]
impl SearchIndexProvider for CountingProvider {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    async fn create_collection(&self, name: &str, schema: &CollectionSchema) -> Result<(), SearchIndexError> {
        self.inner.create_collection(name, schema).await
    }

    async fn retrieve_collection(&self, name: &str) -> Result<CollectionInfo, SearchIndexError> {
        self.inner.retrieve_collection(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<(), SearchIndexError> {
        self.inner.delete_collection(name).await
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, SearchIndexError> {
        self.inner.list_collections().await
    }

    async fn import_documents(
        &self,
        collection: &str,
        documents: &[SearchDocument],
        action: ImportAction,
    ) -> Result<ImportSummary, SearchIndexError> {
        if let Ok(mut batches) = self.log.batches.lock() {
            batches.push((collection.to_string(), documents.len()));
        }
        self.inner.import_documents(collection, documents, action).await
    }

    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<(), SearchIndexError> {
        self.inner.upsert_alias(alias, collection).await
    }

    async fn retrieve_alias(&self, alias: &str) -> Result<String, SearchIndexError> {
        self.inner.retrieve_alias(alias).await
    }

    async fn list_aliases(&self) -> Result<Vec<AliasInfo>, SearchIndexError> {
        self.inner.list_aliases().await
    }

    async fn delete_alias(&self, alias: &str) -> Result<(), SearchIndexError> {
        self.inner.delete_alias(alias).await
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        self.inner.health_check().await
    }
}

/// Source name each entity type is registered under by default.
pub fn source_name(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::SiteInfo => "site_settings",
        EntityType::Product => "products",
        EntityType::Taxonomy => "product_categories",
        EntityType::Menu => "menus",
        EntityType::PageAndPost => "pages_and_posts",
        EntityType::Navigation => "navigation",
    }
}

/// A valid raw record for `entity_type`.
pub fn record(entity_type: EntityType, n: u64) -> Value {
    match entity_type {
        EntityType::SiteInfo => json!({"name": format!("setting_{n}"), "value": "on"}),
        EntityType::Product => json!({"id": n, "name": format!("Product {n}")}),
        EntityType::Taxonomy => json!({"id": n, "name": format!("Term {n}"), "slug": format!("term-{n}")}),
        EntityType::Menu => json!({"id": n, "name": format!("Menu {n}"), "items": []}),
        EntityType::PageAndPost => json!({"id": n, "type": "page", "title": {"rendered": format!("Page {n}")}}),
        EntityType::Navigation => json!({"id": n, "title": {"rendered": "Header"}}),
    }
}

/// One page of `count` records starting at `first`.
pub fn page(entity_type: EntityType, first: u64, count: u64) -> Vec<Value> {
    (first..first + count).map(|n| record(entity_type, n)).collect()
}

/// Search backend, alias manager and sources wired together for a test.
pub struct Harness {
    pub memory: InMemoryProvider,
    pub imports: Arc<ImportLog>,
    pub aliases: Arc<AliasManager>,
    pub sources: Vec<(EntityType, Arc<ScriptedSource>)>,
}

impl Harness {
    /// Every entity type gets a single page of two records.
    pub fn new() -> Self {
        let memory = InMemoryProvider::new();
        let imports = Arc::new(ImportLog::default());
        let client = Arc::new(SearchIndexClient::new(Box::new(CountingProvider {
            inner: memory.clone(),
            log: imports.clone(),
        })));

        let sources = EntityType::all()
            .iter()
            .map(|e| {
                (
                    *e,
                    ScriptedSource::new(source_name(*e), Script::Pages(vec![page(*e, 1, 2)])),
                )
            })
            .collect();

        Self {
            memory,
            imports,
            aliases: Arc::new(AliasManager::new(client)),
            sources,
        }
    }

    /// Replace the script of one entity type's source.
    pub fn script(mut self, entity_type: EntityType, script: Script) -> Self {
        for (e, source) in self.sources.iter_mut() {
            if *e == entity_type {
                *source = ScriptedSource::new(source_name(entity_type), script.clone());
            }
        }
        self
    }

    /// Replace one entity type's source with a variation-serving one.
    pub fn variations(mut self, entity_type: EntityType, script: Script) -> Self {
        for (e, source) in self.sources.iter_mut() {
            if *e == entity_type {
                *source = ScriptedSource::with_variations(source_name(entity_type), script.clone());
            }
        }
        self
    }

    pub fn source(&self, entity_type: EntityType) -> Arc<ScriptedSource> {
        self.sources
            .iter()
            .find(|(e, _)| *e == entity_type)
            .map(|(_, s)| s.clone())
            .unwrap()
    }

    pub fn registry(&self) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        for (_, source) in &self.sources {
            registry.register(source.clone());
        }
        registry
    }

    pub fn orchestrator(&self, specs: &[DescriptorSpec], flags: &FeatureFlags, mode: SyncMode) -> SyncOrchestrator {
        let descriptors = validate_collections_configuration(specs, &self.registry()).unwrap();
        let factory = EngineFactory {
            aliases: self.aliases.clone(),
            memory: Arc::new(FixedProbe::new(0)),
            config: EngineConfig::default(),
            options: ProcessorOptions::default(),
        };
        SyncOrchestrator::new(self.aliases.clone(), factory.build(descriptors, flags), mode)
    }

    pub fn default_orchestrator(&self, mode: SyncMode) -> SyncOrchestrator {
        self.orchestrator(&default_descriptor_specs(), &FeatureFlags::new(), mode)
    }
}
