//! # Store Indexer Repository
//!
//! This crate provides traits and implementations for interacting with the
//! search engine. It includes definitions for errors, interfaces, the
//! `SearchIndexClient`, the `AliasManager` that runs the blue/green collection
//! lifecycle, and concrete backends for Typesense, OpenSearch and in-process
//! memory.

pub mod alias_manager;
pub mod client;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod typesense;
pub mod types;

pub use alias_manager::{AliasManager, AliasStatus};
pub use client::SearchIndexClient;
pub use config::{BackendConnection, SearchIndexConfig};
pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use memory::InMemoryProvider;
pub use opensearch::OpenSearchClient;
pub use typesense::TypesenseClient;
pub use types::{AliasInfo, CollectionInfo, DocumentImportResult, ImportAction, ImportSummary};
