//! # Store Indexer Shared
//!
//! Types shared between the repository, pipeline and binary crates of the
//! storefront search indexer: the fixed set of entity types, the document
//! and schema shapes handed to the search engine, and the per-entity run
//! outcome.

mod document;
mod entity_type;
mod schema;
mod sync_result;

pub use document::{DocumentError, SearchDocument};
pub use entity_type::{EntityType, UnknownEntityType, SYNC_ORDER};
pub use schema::{CollectionSchema, FieldSpec, FieldType};
pub use sync_result::{SkipReason, SyncRunResult, SyncStatus};
