//! Configuration and dependency wiring for the store indexer.

pub mod dependencies;
pub mod settings;

pub use dependencies::Dependencies;
pub use settings::{LogFormat, SearchBackend, SyncConfig};
