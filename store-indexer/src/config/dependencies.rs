//! Dependency initialization and wiring for the store indexer.

use std::sync::Arc;
use tracing::info;

use crate::config::{SearchBackend, SyncConfig};
use crate::IndexingError;
use store_indexer_pipeline::{
    validate_collections_configuration, CollectionDescriptor, EngineFactory, ProcessorOptions,
    SourceRegistry, StoreClient, SyncOrchestrator, SysinfoProbe,
};
use store_indexer_repository::{
    AliasManager, InMemoryProvider, OpenSearchClient, SearchIndexClient, SearchIndexProvider,
    TypesenseClient,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Alias manager over the configured search backend.
    pub aliases: Arc<AliasManager>,
    /// Record sources over the content store.
    pub sources: SourceRegistry,
}

impl Dependencies {
    /// Initialize all dependencies from the configuration.
    ///
    /// `sources` come from [`Dependencies::sources`], so callers can validate
    /// descriptors against them before any backend is contacted. Verifies
    /// that the search backend is reachable before returning.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails
    pub async fn new(config: &SyncConfig, sources: SourceRegistry) -> Result<Self, IndexingError> {
        info!(
            backend = %config.backend,
            store_url = %config.store_url,
            namespace = config.namespace.as_deref().unwrap_or(""),
            "Initializing dependencies"
        );

        let provider = Self::provider(config).await?;
        let client = Arc::new(SearchIndexClient::new(provider));

        let healthy = client
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("{} health check failed: {}", config.backend, e)))?;
        if !healthy {
            return Err(IndexingError::config(format!("{} is unhealthy", config.backend)));
        }
        info!(backend = %config.backend, "Search backend connection verified");

        let aliases = match &config.namespace {
            Some(namespace) => AliasManager::with_namespace(client, namespace.clone()),
            None => AliasManager::new(client),
        };

        Ok(Self {
            aliases: Arc::new(aliases),
            sources,
        })
    }

    /// Search backend for `config.backend`.
    async fn provider(config: &SyncConfig) -> Result<Box<dyn SearchIndexProvider>, IndexingError> {
        let connection = config.backend_connection();
        let provider: Box<dyn SearchIndexProvider> = match config.backend {
            SearchBackend::Typesense => Box::new(TypesenseClient::new(&connection).map_err(|e| {
                IndexingError::config(format!("Failed to create Typesense client: {}", e))
            })?),
            SearchBackend::OpenSearch => Box::new(OpenSearchClient::new(&connection).await.map_err(|e| {
                IndexingError::config(format!("Failed to create OpenSearch client: {}", e))
            })?),
            SearchBackend::Memory => Box::new(InMemoryProvider::new()),
        };
        Ok(provider)
    }

    /// REST record sources for the content store. Performs no network I/O.
    pub fn sources(config: &SyncConfig) -> Result<SourceRegistry, IndexingError> {
        let store = StoreClient::new(&config.store_connection())?;
        Ok(SourceRegistry::rest(Arc::new(store)))
    }

    /// Validate the configured descriptors against `sources`.
    pub fn descriptors(
        config: &SyncConfig,
        sources: &SourceRegistry,
    ) -> Result<Vec<CollectionDescriptor>, IndexingError> {
        Ok(validate_collections_configuration(&config.descriptor_specs(), sources)?)
    }

    /// Build the orchestrator for a sync run over validated `descriptors`.
    pub fn orchestrator(&self, config: &SyncConfig, descriptors: Vec<CollectionDescriptor>) -> SyncOrchestrator {
        let factory = EngineFactory {
            aliases: self.aliases.clone(),
            memory: Arc::new(SysinfoProbe::new()),
            config: config.engine_config(),
            options: ProcessorOptions::default(),
        };
        let engines = factory.build(descriptors, &config.flags);
        SyncOrchestrator::new(self.aliases.clone(), engines, config.mode)
    }
}
