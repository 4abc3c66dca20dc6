//! Collection descriptors and their validation.
//!
//! A descriptor is the static configuration of one entity type: where its
//! records come from, how paging is driven, and which feature flag can turn
//! it off. Descriptors are declared as plain strings and resolved into typed
//! `CollectionDescriptor`s before any sync begins.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use store_indexer_shared::EntityType;

use crate::errors::PipelineError;
use crate::source::{RecordSource, SourceRegistry};

/// Iteration cap for entity types without a tuned value.
pub const DEFAULT_SAFETY_LIMIT: usize = 1000;

/// How paging is driven for an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    SingleBatch,
    BatchWithQuery,
    BatchWithIds,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::SingleBatch => "single_batch",
            SyncType::BatchWithQuery => "batch_with_query",
            SyncType::BatchWithIds => "batch_with_ids",
        }
    }
}

impl FromStr for SyncType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_batch" => Ok(SyncType::SingleBatch),
            "batch_with_query" => Ok(SyncType::BatchWithQuery),
            "batch_with_ids" => Ok(SyncType::BatchWithIds),
            other => Err(format!("Invalid sync_type '{}'", other)),
        }
    }
}

/// Paged queries a source may implement for `batch_with_query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMethod {
    /// Taxonomy terms, page by page.
    TermQuery,
}

impl QueryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMethod::TermQuery => "term_query",
        }
    }
}

impl fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "term_query" => Ok(QueryMethod::TermQuery),
            other => Err(format!("Method '{}' does not exist", other)),
        }
    }
}

/// Identifier resolvers a source may implement for `batch_with_ids`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdMethod {
    ProductIds,
    PostIds,
    NavigationIds,
}

impl IdMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdMethod::ProductIds => "product_ids",
            IdMethod::PostIds => "post_ids",
            IdMethod::NavigationIds => "navigation_ids",
        }
    }
}

impl fmt::Display for IdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product_ids" => Ok(IdMethod::ProductIds),
            "post_ids" => Ok(IdMethod::PostIds),
            "navigation_ids" => Ok(IdMethod::NavigationIds),
            other => Err(format!("Method '{}' does not exist", other)),
        }
    }
}

/// Resolved paging strategy, one variant per `sync_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    SingleBatch,
    BatchWithQuery(QueryMethod),
    BatchWithIds(IdMethod),
}

impl SyncStrategy {
    pub fn sync_type(&self) -> SyncType {
        match self {
            SyncStrategy::SingleBatch => SyncType::SingleBatch,
            SyncStrategy::BatchWithQuery(_) => SyncType::BatchWithQuery,
            SyncStrategy::BatchWithIds(_) => SyncType::BatchWithIds,
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::SingleBatch => f.write_str(SyncType::SingleBatch.as_str()),
            SyncStrategy::BatchWithQuery(method) => {
                write!(f, "{}({})", SyncType::BatchWithQuery.as_str(), method)
            }
            SyncStrategy::BatchWithIds(method) => {
                write!(f, "{}({})", SyncType::BatchWithIds.as_str(), method)
            }
        }
    }
}

/// Unresolved descriptor as declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSpec {
    pub entity: String,
    pub source: String,
    pub sync_type: String,
    pub query_method: Option<String>,
    pub id_method: Option<String>,
    /// Feature flag that can disable the entity type, e.g. `SYNC_TAXONOMY_ENABLED`.
    pub filter_key: Option<String>,
    pub batch_size: usize,
    pub safety_limit: Option<usize>,
    pub estimated_iterations: Option<usize>,
}

impl DescriptorSpec {
    pub fn new(entity: impl Into<String>, source: impl Into<String>, sync_type: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            source: source.into(),
            sync_type: sync_type.into(),
            query_method: None,
            id_method: None,
            filter_key: None,
            batch_size: 50,
            safety_limit: None,
            estimated_iterations: None,
        }
    }

    pub fn with_query_method(mut self, method: impl Into<String>) -> Self {
        self.query_method = Some(method.into());
        self
    }

    pub fn with_id_method(mut self, method: impl Into<String>) -> Self {
        self.id_method = Some(method.into());
        self
    }

    pub fn with_filter_key(mut self, key: impl Into<String>) -> Self {
        self.filter_key = Some(key.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_safety_limit(mut self, limit: usize) -> Self {
        self.safety_limit = Some(limit);
        self
    }
}

/// Validated descriptor, ready to drive an `EntitySyncEngine`.
#[derive(Clone)]
pub struct CollectionDescriptor {
    pub entity_type: EntityType,
    pub source: Arc<dyn RecordSource>,
    pub strategy: SyncStrategy,
    pub filter_key: Option<String>,
    pub batch_size: usize,
    pub safety_limit: usize,
    pub estimated_iterations: usize,
}

impl fmt::Debug for CollectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionDescriptor")
            .field("entity_type", &self.entity_type)
            .field("source", &self.source.name())
            .field("strategy", &self.strategy)
            .field("filter_key", &self.filter_key)
            .field("batch_size", &self.batch_size)
            .field("safety_limit", &self.safety_limit)
            .finish()
    }
}

/// Tuned iteration cap for an entity key.
pub fn safety_limit_for(entity: &str) -> usize {
    match entity {
        "product" | "products" => 2000,
        "taxonomy" => 800,
        "page_and_post" => 1500,
        "navigation" => 200,
        "menu" => 100,
        "site_info" => 50,
        _ => DEFAULT_SAFETY_LIMIT,
    }
}

/// Expected number of iterations for an entity key, used for progress only.
pub fn estimated_iterations_for(entity: &str) -> usize {
    match entity {
        "product" | "products" => 200,
        "taxonomy" => 50,
        "page_and_post" => 100,
        "navigation" => 10,
        "menu" => 5,
        "site_info" => 1,
        _ => 0,
    }
}

/// Progress in percent, capped at 100. Zero when nothing is estimated.
pub fn progress_percentage(current: usize, estimated: usize) -> f64 {
    if estimated == 0 {
        return 0.0;
    }
    (current as f64 / estimated as f64 * 100.0).min(100.0)
}

/// Name of the feature flag for an entity type.
pub fn filter_key_for(entity_type: EntityType) -> String {
    format!("SYNC_{}_ENABLED", entity_type.env_key())
}

/// Built-in descriptors for every entity type, in sync order.
pub fn default_descriptor_specs() -> Vec<DescriptorSpec> {
    let spec = |entity: EntityType, source: &str, sync_type: &str, batch_size: usize| {
        DescriptorSpec {
            filter_key: Some(filter_key_for(entity)),
            safety_limit: Some(safety_limit_for(entity.as_str())),
            estimated_iterations: Some(estimated_iterations_for(entity.as_str())),
            ..DescriptorSpec::new(entity.as_str(), source, sync_type).with_batch_size(batch_size)
        }
    };

    vec![
        spec(EntityType::SiteInfo, "site_settings", "single_batch", 100),
        spec(EntityType::Product, "products", "batch_with_ids", 50).with_id_method("product_ids"),
        spec(EntityType::Taxonomy, "product_categories", "batch_with_query", 50)
            .with_query_method("term_query"),
        spec(EntityType::Menu, "menus", "single_batch", 100),
        spec(EntityType::PageAndPost, "pages_and_posts", "batch_with_ids", 5)
            .with_id_method("post_ids"),
        spec(EntityType::Navigation, "navigation", "batch_with_ids", 5)
            .with_id_method("navigation_ids"),
    ]
}

fn resolve_strategy(
    spec: &DescriptorSpec,
    source: &dyn RecordSource,
) -> Result<SyncStrategy, PipelineError> {
    let config_err = |field: &str, message: String| {
        PipelineError::configuration(spec.entity.clone(), field, message)
    };

    let sync_type = spec
        .sync_type
        .parse::<SyncType>()
        .map_err(|message| config_err("sync_type", message))?;

    match sync_type {
        SyncType::SingleBatch => {
            if !source.supports_single_batch() {
                return Err(config_err(
                    "sync_type",
                    format!("Source '{}' does not support single_batch", source.name()),
                ));
            }
            Ok(SyncStrategy::SingleBatch)
        }
        SyncType::BatchWithQuery => {
            let name = spec.query_method.as_deref().ok_or_else(|| {
                config_err("query_method", "batch_with_query requires a query_method".to_string())
            })?;
            let method = name
                .parse::<QueryMethod>()
                .map_err(|message| config_err("query_method", message))?;
            if !source.supports_query(method) {
                return Err(config_err(
                    "query_method",
                    format!("Method '{}' does not exist on source '{}'", name, source.name()),
                ));
            }
            Ok(SyncStrategy::BatchWithQuery(method))
        }
        SyncType::BatchWithIds => {
            let name = spec.id_method.as_deref().ok_or_else(|| {
                config_err("id_method", "batch_with_ids requires an id_method".to_string())
            })?;
            let method = name
                .parse::<IdMethod>()
                .map_err(|message| config_err("id_method", message))?;
            if !source.supports_ids(method) {
                return Err(config_err(
                    "id_method",
                    format!("Method '{}' does not exist on source '{}'", name, source.name()),
                ));
            }
            Ok(SyncStrategy::BatchWithIds(method))
        }
    }
}

/// Resolve and check every descriptor before a run.
///
/// Performs no network I/O. The first malformed descriptor aborts with a
/// configuration error naming its entity type and field.
///
/// # Arguments
///
/// * `specs` - Declared descriptors
/// * `sources` - Record sources the descriptors may refer to
///
/// # Returns
///
/// * `Ok(descriptors)` - One resolved descriptor per spec, same order
/// * `Err(PipelineError::Configuration)` - A descriptor is malformed
pub fn validate_collections_configuration(
    specs: &[DescriptorSpec],
    sources: &SourceRegistry,
) -> Result<Vec<CollectionDescriptor>, PipelineError> {
    let mut seen = HashSet::new();
    let mut descriptors = Vec::with_capacity(specs.len());

    for spec in specs {
        let entity_type = spec
            .entity
            .parse::<EntityType>()
            .map_err(|e| PipelineError::configuration(spec.entity.clone(), "entity", e.to_string()))?;

        if !seen.insert(entity_type) {
            return Err(PipelineError::configuration(
                spec.entity.clone(),
                "entity",
                format!("Entity type '{}' is declared twice", entity_type),
            ));
        }

        let source = sources.get(&spec.source).ok_or_else(|| {
            PipelineError::configuration(
                spec.entity.clone(),
                "source",
                format!("Collection source '{}' does not exist", spec.source),
            )
        })?;

        let strategy = resolve_strategy(spec, source.as_ref())?;

        if spec.batch_size == 0 {
            return Err(PipelineError::configuration(
                spec.entity.clone(),
                "batch_size",
                "batch_size must be greater than zero",
            ));
        }

        let safety_limit = spec
            .safety_limit
            .unwrap_or_else(|| safety_limit_for(entity_type.as_str()));
        if safety_limit == 0 {
            return Err(PipelineError::configuration(
                spec.entity.clone(),
                "safety_limit",
                "safety_limit must be greater than zero",
            ));
        }

        descriptors.push(CollectionDescriptor {
            entity_type,
            source,
            strategy,
            filter_key: spec.filter_key.clone(),
            batch_size: spec.batch_size,
            safety_limit,
            estimated_iterations: spec
                .estimated_iterations
                .unwrap_or_else(|| estimated_iterations_for(entity_type.as_str())),
        });
    }

    Ok(descriptors)
}

/// Feature flags read once per run. Unknown keys are enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    flags: HashMap<String, bool>,
}

impl FeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, enabled: bool) {
        self.flags.insert(key.into(), enabled);
    }

    pub fn with(mut self, key: impl Into<String>, enabled: bool) -> Self {
        self.set(key, enabled);
        self
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(true)
    }

    /// Whether the descriptor's filter key, if any, allows it to run.
    pub fn allows(&self, descriptor: &CollectionDescriptor) -> bool {
        descriptor
            .filter_key
            .as_deref()
            .map_or(true, |key| self.is_enabled(key))
    }
}
