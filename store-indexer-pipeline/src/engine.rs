//! Entity sync engine.
//!
//! Drives one entity type's full resync against a physical collection: pages
//! the source, transforms records into documents, and imports them in
//! bounded batches. The loop is bounded by the descriptor's safety limit and
//! checks process memory before every iteration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use crate::errors::PipelineError;
use crate::memory::{over_threshold, MemoryProbe};
use crate::processor::DocumentProcessor;
use crate::registry::{progress_percentage, CollectionDescriptor, SyncStrategy};
use crate::source::{variation_parent, RawRecord};
use store_indexer_repository::{
    AliasManager, ImportAction, ImportSummary, SearchIndexClient, SearchIndexError,
};
use store_indexer_shared::{CollectionSchema, EntityType, SearchDocument, SkipReason, SyncRunResult};

/// Number of per-document import failures logged per batch.
const LOGGED_FAILURES: usize = 3;

/// Configuration for the entity sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of retries for a transient import failure.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds.
    pub max_retry_delay_ms: u64,
    /// Resident memory above which buffers are released before the next page.
    pub memory_threshold_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
            memory_threshold_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Batch engine for one entity type.
///
/// The engine only writes documents into the collection it is given; alias
/// changes belong to the `AliasManager`.
pub struct EntitySyncEngine {
    descriptor: CollectionDescriptor,
    processor: Arc<dyn DocumentProcessor>,
    client: Arc<SearchIndexClient>,
    memory: Arc<dyn MemoryProbe>,
    config: EngineConfig,
    enabled: bool,
}

impl EntitySyncEngine {
    pub fn new(
        descriptor: CollectionDescriptor,
        processor: Arc<dyn DocumentProcessor>,
        client: Arc<SearchIndexClient>,
        memory: Arc<dyn MemoryProbe>,
    ) -> Self {
        Self {
            descriptor,
            processor,
            client,
            memory,
            config: EngineConfig::default(),
            enabled: true,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the feature flag value for this run.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn entity_type(&self) -> EntityType {
        self.descriptor.entity_type
    }

    pub fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    pub fn schema(&self) -> CollectionSchema {
        self.processor.schema()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Result reported when the feature flag disables this entity type.
    pub fn skipped_result(&self) -> SyncRunResult {
        info!(
            entity_type = %self.entity_type(),
            filter_key = self.descriptor.filter_key.as_deref().unwrap_or_default(),
            reason = %SkipReason::DisabledByFilter,
            "{} sync is disabled, skipping",
            self.entity_type().display_name()
        );
        SyncRunResult::skipped(self.entity_type(), SkipReason::DisabledByFilter)
    }

    /// The collection to write to when syncing in place: the alias target,
    /// or the default collection (created if missing) on a first run.
    pub async fn resolve_target(&self, aliases: &AliasManager) -> Result<String, PipelineError> {
        let entity_type = self.entity_type();
        if let Some(current) = aliases.current_collection(entity_type).await {
            return Ok(current);
        }

        let fallback = aliases.default_collection_name(entity_type);
        info!(
            entity_type = %entity_type,
            collection = %fallback,
            "No alias yet, syncing into the default collection"
        );
        aliases
            .ensure_collection(entity_type, &fallback, &self.schema())
            .await?;
        Ok(fallback)
    }

    /// Sync in place: resolve the target through `aliases`, then run the
    /// batch loop against it.
    pub async fn run(&self, aliases: &AliasManager) -> SyncRunResult {
        if !self.enabled {
            return self.skipped_result();
        }

        match self.resolve_target(aliases).await {
            Ok(target) => self.sync_into(&target).await,
            Err(e) => {
                error!(
                    entity_type = %self.entity_type(),
                    error = %e,
                    "Failed to resolve target collection"
                );
                SyncRunResult::failed(self.entity_type(), e.to_string())
            }
        }
    }

    /// Run the batch loop against `target`.
    ///
    /// Never fails: runtime errors end the loop and are reported as a
    /// `failed` result carrying the counts reached so far.
    #[instrument(skip(self), fields(entity_type = %self.descriptor.entity_type))]
    pub async fn sync_into(&self, target: &str) -> SyncRunResult {
        if !self.enabled {
            return self.skipped_result();
        }

        let started = Instant::now();
        let mut result = SyncRunResult::new(self.entity_type());
        result.target_collection = Some(target.to_string());

        match self.batch_loop(target, &mut result).await {
            Ok(parents) => self.sync_variations(target, &parents, &mut result).await,
            Err(e) => {
                error!(
                    entity_type = %self.entity_type(),
                    collection = %target,
                    page = result.iterations + 1,
                    error = %e,
                    "Sync failed"
                );
                result.mark_failed(e.to_string());
            }
        }

        result.elapsed = started.elapsed();
        info!(
            entity_type = %self.entity_type(),
            collection = %target,
            status = result.status.label(),
            iterations = result.iterations,
            total_imports = result.total_imports,
            successful_imports = result.successful_imports,
            failed_imports = result.failed_imports,
            truncated = result.truncated,
            memory_reclaims = result.memory_reclaims,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Sync finished"
        );
        result
    }

    /// The page loop. Returns the variable products seen, when the source
    /// serves variations.
    async fn batch_loop(&self, target: &str, result: &mut SyncRunResult) -> Result<Vec<RawRecord>, PipelineError> {
        let entity_type = self.entity_type();
        let limit = self.descriptor.safety_limit;
        let collect_parents = self.descriptor.source.supports_variations();
        let mut parents: Vec<RawRecord> = Vec::new();
        let mut documents: Vec<SearchDocument> = Vec::with_capacity(self.descriptor.batch_size);
        let mut page = 1;

        loop {
            if self.check_memory(&mut documents) {
                result.memory_reclaims += 1;
            }

            let records = self.fetch_page(page).await?;
            if records.is_empty() {
                debug!(entity_type = %entity_type, page = page, "Empty page, source exhausted");
                break;
            }

            // The page past the limit is read only to tell an exact fit from a longer source.
            if result.iterations >= limit {
                warn!(
                    entity_type = %entity_type,
                    limit = limit,
                    "Reached maximum iteration limit ({}). Stopping to prevent infinite loop.",
                    limit
                );
                result.truncated = true;
                break;
            }

            result.iterations += 1;
            result.total_records += records.len();
            if collect_parents {
                parents.extend(records.iter().filter_map(variation_parent));
            }

            documents.clear();
            for record in &records {
                match self.processor.transform(record) {
                    Ok(document) => documents.push(document),
                    Err(e) => {
                        warn!(entity_type = %entity_type, page = page, error = %e, "Skipping record");
                        result.failed_imports += 1;
                    }
                }
            }
            drop(records);

            for chunk in documents.chunks(self.descriptor.batch_size) {
                let summary = self.import_with_retry(target, chunk).await?;
                for failure in summary.failures().take(LOGGED_FAILURES) {
                    warn!(
                        entity_type = %entity_type,
                        collection = %target,
                        document_id = %failure.id,
                        error = failure.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                        "Document rejected"
                    );
                }
                result.total_imports += summary.total;
                result.successful_imports += summary.succeeded;
                result.failed_imports += summary.failed;
            }

            info!(
                entity_type = %entity_type,
                collection = %target,
                page = page,
                batch_imported = documents.len(),
                total_imports = result.total_imports,
                progress_pct =
                    progress_percentage(result.iterations, self.descriptor.estimated_iterations),
                "Batch completed"
            );

            page += 1;
        }

        Ok(parents)
    }

    /// Import the variations of `parents` into the same collection.
    ///
    /// Variation failures are counted and logged; they never fail the run.
    async fn sync_variations(&self, target: &str, parents: &[RawRecord], result: &mut SyncRunResult) {
        if parents.is_empty() {
            return;
        }
        let entity_type = self.entity_type();
        let source = &self.descriptor.source;
        info!(
            entity_type = %entity_type,
            collection = %target,
            parents = parents.len(),
            "Syncing product variations to the same collection"
        );

        let mut synced = 0;
        for parent in parents {
            let parent_id = parent.get("id").map(|id| id.to_string()).unwrap_or_default();
            let variations = match source.fetch_variations(parent).await {
                Ok(variations) => variations,
                Err(e) => {
                    warn!(entity_type = %entity_type, parent_id = %parent_id, error = %e, "Variation fetch failed");
                    continue;
                }
            };

            let mut documents = Vec::with_capacity(variations.len());
            for record in &variations {
                match self.processor.transform(record) {
                    Ok(document) => documents.push(document),
                    Err(e) => {
                        warn!(entity_type = %entity_type, parent_id = %parent_id, error = %e, "Skipping variation");
                        result.failed_imports += 1;
                    }
                }
            }

            for chunk in documents.chunks(self.descriptor.batch_size) {
                match self.import_with_retry(target, chunk).await {
                    Ok(summary) => {
                        result.total_imports += summary.total;
                        result.successful_imports += summary.succeeded;
                        result.failed_imports += summary.failed;
                        synced += summary.succeeded;
                    }
                    Err(e) => {
                        warn!(
                            entity_type = %entity_type,
                            parent_id = %parent_id,
                            count = chunk.len(),
                            error = %e,
                            "Variation import failed"
                        );
                        result.total_imports += chunk.len();
                        result.failed_imports += chunk.len();
                    }
                }
            }
        }

        info!(entity_type = %entity_type, collection = %target, variations = synced, "Product variations synced");
    }

    /// One page of raw records; empty once the source is exhausted.
    async fn fetch_page(&self, page: usize) -> Result<Vec<RawRecord>, PipelineError> {
        let source = &self.descriptor.source;
        let batch_size = self.descriptor.batch_size;

        match self.descriptor.strategy {
            SyncStrategy::SingleBatch => {
                if page > 1 {
                    return Ok(Vec::new());
                }
                source.fetch_all().await
            }
            SyncStrategy::BatchWithQuery(method) => source.query_page(method, page, batch_size).await,
            SyncStrategy::BatchWithIds(method) => {
                let ids = source.resolve_ids(method, page, batch_size).await?;
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                source.fetch_by_ids(method, &ids).await
            }
        }
    }

    /// Release batch buffers when the process is above the memory threshold.
    /// Returns whether anything was released.
    fn check_memory(&self, documents: &mut Vec<SearchDocument>) -> bool {
        let Some(bytes) = over_threshold(self.memory.as_ref(), self.config.memory_threshold_bytes) else {
            return false;
        };
        let retained = documents.capacity();
        *documents = Vec::new();
        info!(
            entity_type = %self.entity_type(),
            resident_mb = bytes / (1024 * 1024),
            threshold_mb = self.config.memory_threshold_bytes / (1024 * 1024),
            released_slots = retained,
            "Memory usage above threshold, released batch buffers"
        );
        true
    }

    /// Import documents with exponential backoff retry logic.
    async fn import_with_retry(
        &self,
        target: &str,
        documents: &[SearchDocument],
    ) -> Result<ImportSummary, SearchIndexError> {
        let mut delay_ms = self.config.initial_retry_delay_ms;
        let mut last_error: Option<SearchIndexError> = None;

        for attempt in 0..=self.config.max_retries {
            match self
                .client
                .import(target, documents, ImportAction::Upsert)
                .await
            {
                Ok(summary) => {
                    if attempt > 0 {
                        info!(
                            attempt = attempt,
                            count = documents.len(),
                            collection = %target,
                            "Import succeeded after retry"
                        );
                    }
                    return Ok(summary);
                }
                Err(e) => {
                    if !e.is_transient() {
                        debug!(error = %e, "Non-retryable import error");
                        return Err(e);
                    }

                    if attempt < self.config.max_retries {
                        warn!(
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            delay_ms = delay_ms,
                            collection = %target,
                            error = %e,
                            "Import failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = std::cmp::min(delay_ms * 2, self.config.max_retry_delay_ms);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SearchIndexError::import("Unknown error after retries")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use store_indexer_repository::{
        AliasInfo, CollectionInfo, InMemoryProvider, SearchIndexProvider,
    };

    use crate::memory::FixedProbe;
    use crate::processor::{processor_for, ProcessorOptions};
    use crate::registry::{IdMethod, QueryMethod};
    use crate::source::RecordSource;

    /// Serves `pages` in order, then empty pages. With `endless`, keeps
    /// repeating the last page forever.
    struct PagedSource {
        pages: Vec<Vec<Value>>,
        endless: bool,
        calls: AtomicUsize,
    }

    impl PagedSource {
        fn new(pages: Vec<Vec<Value>>) -> Self {
            Self {
                pages,
                endless: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn endless(page: Vec<Value>) -> Self {
            Self {
                pages: vec![page],
                endless: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RecordSource for PagedSource {
        fn name(&self) -> &str {
            "paged"
        }

        fn supports_query(&self, _method: QueryMethod) -> bool {
            true
        }

        async fn query_page(
            &self,
            _method: QueryMethod,
            page: usize,
            _batch_size: usize,
        ) -> Result<Vec<Value>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.endless {
                return Ok(self.pages[0].clone());
            }
            Ok(self.pages.get(page - 1).cloned().unwrap_or_default())
        }
    }

    fn menu(id: u64) -> Value {
        json!({"id": id, "name": format!("Menu {id}"), "items": []})
    }

    fn descriptor(source: Arc<dyn RecordSource>, batch_size: usize, safety_limit: usize) -> CollectionDescriptor {
        CollectionDescriptor {
            entity_type: EntityType::Menu,
            source,
            strategy: SyncStrategy::BatchWithQuery(QueryMethod::TermQuery),
            filter_key: Some("SYNC_MENU_ENABLED".to_string()),
            batch_size,
            safety_limit,
            estimated_iterations: 5,
        }
    }

    async fn setup(
        source: Arc<dyn RecordSource>,
        batch_size: usize,
        safety_limit: usize,
    ) -> (EntitySyncEngine, InMemoryProvider, Arc<SearchIndexClient>) {
        let provider = InMemoryProvider::new();
        let client = Arc::new(SearchIndexClient::new(Box::new(provider.clone())));
        let processor = processor_for(EntityType::Menu, &ProcessorOptions::default());
        client.create_collection("menu", &processor.schema()).await.unwrap();

        let engine = EntitySyncEngine::new(
            descriptor(source, batch_size, safety_limit),
            processor,
            client.clone(),
            Arc::new(FixedProbe::new(0)),
        );
        (engine, provider, client)
    }

    #[tokio::test]
    async fn test_two_record_page_then_empty_page() {
        let source = Arc::new(PagedSource::new(vec![vec![menu(1), menu(2)]]));
        let (engine, provider, _) = setup(source.clone(), 2, 100).await;

        let result = engine.sync_into("menu").await;

        assert!(result.is_completed());
        assert_eq!(result.iterations, 1);
        assert_eq!(result.total_imports, 2);
        assert_eq!(result.successful_imports, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.documents("menu").await.len(), 2);
    }

    #[tokio::test]
    async fn test_safety_limit_stops_endless_source() {
        let source = Arc::new(PagedSource::endless(vec![menu(1)]));
        let (engine, _, _) = setup(source.clone(), 10, 7).await;

        let result = engine.sync_into("menu").await;

        assert!(result.is_completed());
        assert!(result.truncated);
        assert_eq!(result.iterations, 7);
        assert_eq!(source.calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_source_that_fits_safety_limit_is_not_truncated() {
        let source = Arc::new(PagedSource::new(vec![vec![menu(1)], vec![menu(2)]]));
        let (engine, provider, _) = setup(source.clone(), 1, 2).await;

        let result = engine.sync_into("menu").await;

        assert!(result.is_completed());
        assert!(!result.truncated);
        assert_eq!(result.iterations, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(provider.documents("menu").await.len(), 2);
    }

    #[tokio::test]
    async fn test_resync_converges() {
        let source = Arc::new(PagedSource::new(vec![vec![menu(1), menu(2)], vec![menu(3)]]));
        let (engine, provider, _) = setup(source, 2, 100).await;

        engine.sync_into("menu").await;
        let first = provider.documents("menu").await;
        engine.sync_into("menu").await;
        let second = provider.documents("menu").await;

        assert_eq!(first.len(), 3);
        assert_eq!(first.iter().map(|d| &d.id).collect::<Vec<_>>(), second.iter().map(|d| &d.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_bad_records_are_counted_not_fatal() {
        let source = Arc::new(PagedSource::new(vec![vec![menu(1), json!({"name": "no id"})]]));
        let (engine, _, _) = setup(source, 10, 100).await;

        let result = engine.sync_into("menu").await;

        assert!(result.is_completed());
        assert_eq!(result.successful_imports, 1);
        assert_eq!(result.failed_imports, 1);
    }

    #[tokio::test]
    async fn test_missing_collection_fails_run() {
        let source = Arc::new(PagedSource::new(vec![vec![menu(1)]]));
        let (engine, _, _) = setup(source, 10, 100).await;

        let result = engine.sync_into("menu_does_not_exist").await;

        assert!(result.is_failed());
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn test_disabled_engine_skips() {
        let source = Arc::new(PagedSource::new(vec![vec![menu(1)]]));
        let (engine, _, _) = setup(source.clone(), 10, 100).await;
        let engine = engine.with_enabled(false);

        let result = engine.sync_into("menu").await;

        assert_eq!(result.skip_reason(), Some(SkipReason::DisabledByFilter));
        assert_eq!(result.total_imports, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_memory_pressure_does_not_interrupt() {
        let source = Arc::new(PagedSource::new(vec![vec![menu(1)], vec![menu(2)]]));
        let (engine, _, _) = setup(source, 10, 100).await;
        let engine = EntitySyncEngine {
            memory: Arc::new(FixedProbe::new(u64::MAX)),
            ..engine
        };

        let result = engine.sync_into("menu").await;

        assert!(result.is_completed());
        assert_eq!(result.successful_imports, 2);
        assert_eq!(result.memory_reclaims, 3);
    }

    #[tokio::test]
    async fn test_no_reclaims_below_memory_threshold() {
        let source = Arc::new(PagedSource::new(vec![vec![menu(1)], vec![menu(2)]]));
        let (engine, _, _) = setup(source, 10, 100).await;

        let result = engine.sync_into("menu").await;

        assert!(result.is_completed());
        assert_eq!(result.memory_reclaims, 0);
    }

    /// One page of products; variable products have two variations each,
    /// except `failing_parent`, whose variation fetch errors.
    struct VariableSource {
        products: Vec<Value>,
        failing_parent: Option<u64>,
    }

    #[async_trait]
    impl RecordSource for VariableSource {
        fn name(&self) -> &str {
            "products"
        }

        fn supports_query(&self, _method: QueryMethod) -> bool {
            true
        }

        fn supports_variations(&self) -> bool {
            true
        }

        async fn query_page(
            &self,
            _method: QueryMethod,
            page: usize,
            _batch_size: usize,
        ) -> Result<Vec<Value>, PipelineError> {
            Ok(if page == 1 { self.products.clone() } else { Vec::new() })
        }

        async fn fetch_variations(&self, parent: &RawRecord) -> Result<Vec<RawRecord>, PipelineError> {
            let parent_id = parent["id"].as_u64().unwrap_or_default();
            if Some(parent_id) == self.failing_parent {
                return Err(PipelineError::source("variations unavailable"));
            }
            Ok((1..=2)
                .map(|n| {
                    json!({
                        "id": parent_id * 100 + n,
                        "name": format!("{} - {}", parent["name"].as_str().unwrap_or_default(), n),
                        "type": "variation",
                        "parent_id": parent_id
                    })
                })
                .collect())
        }
    }

    async fn variable_engine(source: VariableSource) -> (EntitySyncEngine, InMemoryProvider) {
        let provider = InMemoryProvider::new();
        let client = Arc::new(SearchIndexClient::new(Box::new(provider.clone())));
        let processor = processor_for(EntityType::Product, &ProcessorOptions::default());
        client.create_collection("product", &processor.schema()).await.unwrap();

        let descriptor = CollectionDescriptor {
            entity_type: EntityType::Product,
            filter_key: None,
            ..descriptor(Arc::new(source), 10, 100)
        };
        let engine = EntitySyncEngine::new(descriptor, processor, client, Arc::new(FixedProbe::new(0)));
        (engine, provider)
    }

    #[tokio::test]
    async fn test_variations_land_in_product_collection() {
        let (engine, provider) = variable_engine(VariableSource {
            products: vec![
                json!({"id": 1, "name": "Mug", "type": "simple"}),
                json!({"id": 2, "name": "Tee", "type": "variable", "categories": [{"name": "Shirts", "slug": "shirts"}]}),
            ],
            failing_parent: None,
        })
        .await;

        let result = engine.sync_into("product").await;

        assert!(result.is_completed());
        assert_eq!(result.total_records, 2);
        assert_eq!(result.successful_imports, 4);
        let documents = provider.documents("product").await;
        let ids: Vec<_> = documents.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&"201") && ids.contains(&"202"));
        let variation = documents.iter().find(|d| d.id == "201").unwrap();
        assert_eq!(variation.get("parentId"), Some(&json!("2")));
        assert_eq!(variation.get("name"), Some(&json!("Tee - 1")));
    }

    #[tokio::test]
    async fn test_variation_failure_does_not_fail_run() {
        let (engine, provider) = variable_engine(VariableSource {
            products: vec![
                json!({"id": 2, "name": "Tee", "type": "variable"}),
                json!({"id": 3, "name": "Hoodie", "type": "variable"}),
            ],
            failing_parent: Some(2),
        })
        .await;

        let result = engine.sync_into("product").await;

        assert!(result.is_completed());
        assert_eq!(result.successful_imports, 4);
        assert_eq!(provider.documents("product").await.len(), 4);
    }

    #[tokio::test]
    async fn test_run_bootstraps_default_collection() {
        let source = Arc::new(PagedSource::new(vec![vec![menu(1)]]));
        let provider = InMemoryProvider::new();
        let client = Arc::new(SearchIndexClient::new(Box::new(provider.clone())));
        let engine = EntitySyncEngine::new(
            descriptor(source, 10, 100),
            processor_for(EntityType::Menu, &ProcessorOptions::default()),
            client.clone(),
            Arc::new(FixedProbe::new(0)),
        );
        let aliases = AliasManager::new(client);

        let result = engine.run(&aliases).await;

        assert!(result.is_completed());
        assert_eq!(result.target_collection.as_deref(), Some("menu"));
        assert_eq!(provider.documents("menu").await.len(), 1);
    }

    /// Fails with a transient error a fixed number of times, then delegates.
    struct FlakyProvider {
        inner: InMemoryProvider,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl SearchIndexProvider for FlakyProvider {
        fn backend_name(&self) -> &'static str {
            "flaky"
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
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(SearchIndexError::response(503, "Service Unavailable"));
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

    async fn flaky_engine(failures: usize) -> (EntitySyncEngine, InMemoryProvider) {
        let inner = InMemoryProvider::new();
        let client = Arc::new(SearchIndexClient::new(Box::new(FlakyProvider {
            inner: inner.clone(),
            failures_left: AtomicUsize::new(failures),
        })));
        let processor = processor_for(EntityType::Menu, &ProcessorOptions::default());
        client.create_collection("menu", &processor.schema()).await.unwrap();

        let source = Arc::new(PagedSource::new(vec![vec![menu(1)]]));
        let engine = EntitySyncEngine::new(
            descriptor(source, 10, 100),
            processor,
            client,
            Arc::new(FixedProbe::new(0)),
        );
        (engine, inner)
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_import_failure_is_retried() {
        let (engine, inner) = flaky_engine(2).await;

        let result = engine.sync_into("menu").await;

        assert!(result.is_completed());
        assert_eq!(inner.documents("menu").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_fails_run() {
        let (engine, _) = flaky_engine(10).await;

        let result = engine.sync_into("menu").await;

        assert!(result.is_failed());
        assert!(result.error().unwrap_or_default().contains("503"));
    }
}
