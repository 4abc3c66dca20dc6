//! Environment configuration, read once at start-up.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use store_indexer_pipeline::registry::filter_key_for;
use store_indexer_pipeline::{
    default_descriptor_specs, DescriptorSpec, EngineConfig, FeatureFlags, StoreConnection,
    SyncMode,
};
use store_indexer_repository::BackendConnection;
use store_indexer_shared::EntityType;

use crate::IndexingError;

/// Default Typesense URL.
const DEFAULT_TYPESENSE_URL: &str = "http://localhost:8108";

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default content store URL.
const DEFAULT_STORE_URL: &str = "http://localhost:8080";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MEMORY_THRESHOLD_MB: u64 = 512;
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Which search engine the indexer writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchBackend {
    #[default]
    Typesense,
    OpenSearch,
    /// In-process collections, for dry runs.
    Memory,
}

impl SearchBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchBackend::Typesense => "typesense",
            SearchBackend::OpenSearch => "opensearch",
            SearchBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for SearchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "typesense" => Ok(SearchBackend::Typesense),
            "opensearch" => Ok(SearchBackend::OpenSearch),
            "memory" => Ok(SearchBackend::Memory),
            other => Err(format!("Unknown search backend '{}'", other)),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format '{}'", other)),
        }
    }
}

/// Everything the indexer reads from the environment.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub backend: SearchBackend,
    pub typesense_url: String,
    pub typesense_api_key: Option<String>,
    pub opensearch_url: String,
    pub search_timeout: Duration,
    /// Optional store/site prefix for alias and collection names.
    pub namespace: Option<String>,
    pub store_url: String,
    pub store_consumer_key: Option<String>,
    pub store_consumer_secret: Option<String>,
    pub store_timeout: Duration,
    pub mode: SyncMode,
    pub memory_threshold_mb: u64,
    pub max_retries: u32,
    pub flags: FeatureFlags,
    pub batch_sizes: HashMap<EntityType, usize>,
    pub safety_limits: HashMap<EntityType, usize>,
    pub log_format: LogFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            typesense_url: DEFAULT_TYPESENSE_URL.to_string(),
            typesense_api_key: None,
            opensearch_url: DEFAULT_OPENSEARCH_URL.to_string(),
            search_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            namespace: None,
            store_url: DEFAULT_STORE_URL.to_string(),
            store_consumer_key: None,
            store_consumer_secret: None,
            store_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            mode: SyncMode::default(),
            memory_threshold_mb: DEFAULT_MEMORY_THRESHOLD_MB,
            max_retries: DEFAULT_MAX_RETRIES,
            flags: FeatureFlags::new(),
            batch_sizes: HashMap::new(),
            safety_limits: HashMap::new(),
            log_format: LogFormat::default(),
        }
    }
}

impl SyncConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_BACKEND`: `typesense`, `opensearch` or `memory` (default: typesense)
    /// - `TYPESENSE_URL` / `TYPESENSE_API_KEY`: Typesense endpoint (default: http://localhost:8108)
    /// - `OPENSEARCH_URL`: OpenSearch endpoint (default: http://localhost:9200)
    /// - `SEARCH_TIMEOUT_SECS`: bound on every backend call (default: 30)
    /// - `SEARCH_NAMESPACE`: prefix for alias and collection names (default: unset)
    /// - `STORE_URL`, `STORE_CONSUMER_KEY`, `STORE_CONSUMER_SECRET`: content store endpoint
    /// - `STORE_TIMEOUT_SECS`: bound on every source call (default: 30)
    /// - `SYNC_MODE`: `rebuild` or `in_place` (default: rebuild)
    /// - `SYNC_MEMORY_THRESHOLD_MB`: memory pressure threshold (default: 512)
    /// - `SYNC_MAX_RETRIES`: import retries (default: 3)
    /// - `SYNC_<ENTITY>_ENABLED`, `SYNC_<ENTITY>_BATCH_SIZE`, `SYNC_<ENTITY>_SAFETY_LIMIT`
    /// - `LOG_FORMAT`: `pretty` or `json` (default: pretty)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let mut flags = FeatureFlags::new();
        let mut batch_sizes = HashMap::new();
        let mut safety_limits = HashMap::new();
        for entity_type in EntityType::all() {
            let key = entity_type.env_key();

            let flag = filter_key_for(*entity_type);
            if let Some(value) = get(&flag) {
                flags.set(flag.clone(), parse_flag(&flag, &value)?);
            }

            let batch_key = format!("SYNC_{}_BATCH_SIZE", key);
            if let Some(value) = get(&batch_key) {
                batch_sizes.insert(*entity_type, parse_number(&batch_key, &value)?);
            }

            let limit_key = format!("SYNC_{}_SAFETY_LIMIT", key);
            if let Some(value) = get(&limit_key) {
                safety_limits.insert(*entity_type, parse_number(&limit_key, &value)?);
            }
        }

        Ok(Self {
            backend: parse_or(get("SEARCH_BACKEND"), "SEARCH_BACKEND", defaults.backend)?,
            typesense_url: get("TYPESENSE_URL").unwrap_or(defaults.typesense_url),
            typesense_api_key: get("TYPESENSE_API_KEY"),
            opensearch_url: get("OPENSEARCH_URL").unwrap_or(defaults.opensearch_url),
            search_timeout: Duration::from_secs(parse_or(
                get("SEARCH_TIMEOUT_SECS"),
                "SEARCH_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            namespace: get("SEARCH_NAMESPACE"),
            store_url: get("STORE_URL").unwrap_or(defaults.store_url),
            store_consumer_key: get("STORE_CONSUMER_KEY"),
            store_consumer_secret: get("STORE_CONSUMER_SECRET"),
            store_timeout: Duration::from_secs(parse_or(
                get("STORE_TIMEOUT_SECS"),
                "STORE_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            mode: parse_or(get("SYNC_MODE"), "SYNC_MODE", defaults.mode)?,
            memory_threshold_mb: parse_or(
                get("SYNC_MEMORY_THRESHOLD_MB"),
                "SYNC_MEMORY_THRESHOLD_MB",
                defaults.memory_threshold_mb,
            )?,
            max_retries: parse_or(get("SYNC_MAX_RETRIES"), "SYNC_MAX_RETRIES", defaults.max_retries)?,
            flags,
            batch_sizes,
            safety_limits,
            log_format: parse_or(get("LOG_FORMAT"), "LOG_FORMAT", defaults.log_format)?,
        })
    }

    /// Default descriptors with the per-entity overrides applied.
    pub fn descriptor_specs(&self) -> Vec<DescriptorSpec> {
        default_descriptor_specs()
            .into_iter()
            .map(|mut spec| {
                if let Ok(entity_type) = spec.entity.parse::<EntityType>() {
                    if let Some(batch_size) = self.batch_sizes.get(&entity_type) {
                        spec.batch_size = *batch_size;
                    }
                    if let Some(limit) = self.safety_limits.get(&entity_type) {
                        spec.safety_limit = Some(*limit);
                    }
                }
                spec
            })
            .collect()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_retries: self.max_retries,
            memory_threshold_bytes: self.memory_threshold_mb.saturating_mul(1024 * 1024),
            ..EngineConfig::default()
        }
    }

    pub fn store_connection(&self) -> StoreConnection {
        let connection = StoreConnection::new(&self.store_url).with_timeout(self.store_timeout);
        match (&self.store_consumer_key, &self.store_consumer_secret) {
            (Some(key), Some(secret)) => connection.with_credentials(key, secret),
            _ => connection,
        }
    }

    /// Connection settings for the configured HTTP backend.
    pub fn backend_connection(&self) -> BackendConnection {
        match self.backend {
            SearchBackend::OpenSearch => BackendConnection::new(&self.opensearch_url),
            _ => {
                let connection = BackendConnection::new(&self.typesense_url);
                match &self.typesense_api_key {
                    Some(key) => connection.with_api_key(key),
                    None => connection,
                }
            }
        }
        .with_timeout(self.search_timeout)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, IndexingError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| IndexingError::config(format!("{}: {}", key, e))),
        None => Ok(default),
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize, IndexingError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(IndexingError::config(format!(
            "{}: expected a positive integer, got '{}'",
            key, value
        ))),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, IndexingError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(IndexingError::config(format!(
            "{}: expected a boolean, got '{}'",
            key, value
        ))),
    }
}
