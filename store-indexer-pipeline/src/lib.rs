//! # Store Indexer Pipeline
//!
//! This crate provides the reindexing pipeline that mirrors content-store
//! data into search collections.
//!
//! ## Architecture
//!
//! The pipeline follows a Source-Processor-Engine pattern:
//!
//! 1. **Source**: Pages raw records out of the content store
//! 2. **Processor**: Transforms records into search documents
//! 3. **Engine**: Imports documents in bounded, retried batches
//! 4. **Orchestrator**: Runs every entity type in dependency order and
//!    promotes freshly built collections through their aliases
//!
//! Descriptors in [`registry`] wire an entity type to its source and paging
//! strategy; they are validated before any sync begins.

pub mod engine;
pub mod errors;
pub mod memory;
pub mod orchestrator;
pub mod processor;
pub mod registry;
pub mod report;
pub mod source;

pub use engine::{EngineConfig, EntitySyncEngine};
pub use errors::PipelineError;
pub use memory::{FixedProbe, MemoryProbe, SysinfoProbe};
pub use orchestrator::{EngineFactory, SyncMode, SyncOrchestrator};
pub use processor::{processor_for, DocumentProcessor, ProcessorOptions};
pub use registry::{
    default_descriptor_specs, validate_collections_configuration, CollectionDescriptor,
    DescriptorSpec, FeatureFlags, IdMethod, QueryMethod, SyncStrategy, SyncType,
};
pub use report::SyncReport;
pub use source::{RecordSource, SourceRegistry, StoreClient, StoreConnection};
