//! Orchestrator module for the store indexer pipeline.
//!
//! Runs every registered entity type in dependency order, isolates failures
//! per entity type, and owns the blue/green collection swap around each
//! engine run.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info, instrument, warn};

use crate::engine::{EngineConfig, EntitySyncEngine};
use crate::memory::MemoryProbe;
use crate::processor::{processor_for, ProcessorOptions};
use crate::registry::{CollectionDescriptor, FeatureFlags};
use crate::report::{SyncReport, RULE_WIDTH};
use store_indexer_repository::AliasManager;
use store_indexer_shared::{EntityType, SyncRunResult, SYNC_ORDER};

/// How a sync reaches the live collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Build a fresh collection, then promote it through the alias.
    #[default]
    Rebuild,
    /// Upsert into the collection the alias currently points at.
    InPlace,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Rebuild => "rebuild",
            SyncMode::InPlace => "in_place",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "rebuild" | "blue_green" => Ok(SyncMode::Rebuild),
            "in_place" | "inplace" => Ok(SyncMode::InPlace),
            other => Err(format!("Unknown sync mode '{}'", other)),
        }
    }
}

/// Shared dependencies for building one engine per descriptor.
pub struct EngineFactory {
    pub aliases: Arc<AliasManager>,
    pub memory: Arc<dyn MemoryProbe>,
    pub config: EngineConfig,
    pub options: ProcessorOptions,
}

impl EngineFactory {
    /// One engine per descriptor. Feature flags are applied here, once.
    pub fn build(&self, descriptors: Vec<CollectionDescriptor>, flags: &FeatureFlags) -> Vec<EntitySyncEngine> {
        descriptors
            .into_iter()
            .map(|descriptor| {
                let enabled = flags.allows(&descriptor);
                let processor = processor_for(descriptor.entity_type, &self.options);
                EntitySyncEngine::new(
                    descriptor,
                    processor,
                    self.aliases.client().clone(),
                    self.memory.clone(),
                )
                .with_config(self.config.clone())
                .with_enabled(enabled)
            })
            .collect()
    }
}

/// Runs entity sync engines in the fixed dependency order.
pub struct SyncOrchestrator {
    aliases: Arc<AliasManager>,
    engines: Vec<EntitySyncEngine>,
    mode: SyncMode,
}

impl SyncOrchestrator {
    /// Create an orchestrator. Engines are reordered into sync order.
    pub fn new(aliases: Arc<AliasManager>, mut engines: Vec<EntitySyncEngine>, mode: SyncMode) -> Self {
        engines.sort_by_key(|engine| {
            SYNC_ORDER
                .iter()
                .position(|e| *e == engine.entity_type())
                .unwrap_or(SYNC_ORDER.len())
        });
        Self {
            aliases,
            engines,
            mode,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn aliases(&self) -> &Arc<AliasManager> {
        &self.aliases
    }

    pub fn engine(&self, entity_type: EntityType) -> Option<&EntitySyncEngine> {
        self.engines.iter().find(|e| e.entity_type() == entity_type)
    }

    pub fn entity_types(&self) -> Vec<EntityType> {
        self.engines.iter().map(|e| e.entity_type()).collect()
    }

    /// Sync every entity type in order and collect the results.
    ///
    /// A failure or panic in one entity type is recorded in its result and
    /// the run continues with the next one.
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub async fn run_all(&self) -> SyncReport {
        let started = std::time::Instant::now();
        let mut report = SyncReport::new(Utc::now());

        info!(
            entity_types = self.engines.len(),
            backend = self.aliases.client().backend_name(),
            "Starting full sync"
        );

        for engine in &self.engines {
            let result = self.run_isolated(engine).await;
            report.push(result);
        }

        report.elapsed = started.elapsed();
        info!(
            completed = report.completed(),
            failed = report.failed(),
            skipped = report.skipped(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Full sync finished"
        );
        report
    }

    /// Sync a single entity type, outside the ordered run.
    pub async fn run_one(&self, entity_type: EntityType) -> Option<SyncRunResult> {
        let engine = self.engine(entity_type)?;
        Some(self.run_isolated(engine).await)
    }

    async fn run_isolated(&self, engine: &EntitySyncEngine) -> SyncRunResult {
        let entity_type = engine.entity_type();
        info!("{}", "=".repeat(RULE_WIDTH));
        info!(entity_type = %entity_type, "Syncing {} collection...", entity_type.display_name());
        info!("{}", "=".repeat(RULE_WIDTH));

        match AssertUnwindSafe(self.run_entity(engine)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(entity_type = %entity_type, error = %message, "Entity sync panicked");
                SyncRunResult::failed(entity_type, format!("panic: {}", message))
            }
        }
    }

    /// Run one engine according to the sync mode.
    pub async fn run_entity(&self, engine: &EntitySyncEngine) -> SyncRunResult {
        if !engine.is_enabled() {
            return engine.skipped_result();
        }
        match self.mode {
            SyncMode::InPlace => engine.run(&self.aliases).await,
            SyncMode::Rebuild => self.rebuild(engine).await,
        }
    }

    /// Build into a fresh collection and promote it only after a complete,
    /// untruncated pass. Otherwise the fresh collection is retired and the
    /// alias keeps serving the previous one.
    async fn rebuild(&self, engine: &EntitySyncEngine) -> SyncRunResult {
        let entity_type = engine.entity_type();

        let Some(collection) = self.aliases.create_collection(entity_type, &engine.schema()).await else {
            return SyncRunResult::failed(
                entity_type,
                format!("Failed to create a new {} collection", entity_type),
            );
        };

        let mut result = engine.sync_into(&collection).await;

        if result.is_completed() && !result.truncated {
            if self.aliases.promote(entity_type, &collection).await {
                result.promoted = true;
                let retired = self.aliases.cleanup_stale(entity_type).await;
                if !retired.is_empty() {
                    info!(entity_type = %entity_type, retired = ?retired, "Retired stale collections");
                }
                return result;
            }
            warn!(
                entity_type = %entity_type,
                collection = %collection,
                "Promotion failed, alias keeps serving the previous collection"
            );
        } else if result.truncated {
            warn!(
                entity_type = %entity_type,
                collection = %collection,
                "Run hit the safety limit, not promoting a partial collection"
            );
        }

        self.aliases.retire(entity_type, &collection).await;
        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
