//! Request and response types for search index operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SearchIndexError;

/// How an import treats documents that already exist in the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportAction {
    /// Fail documents whose id already exists.
    Insert,
    /// Create or fully replace each document.
    #[default]
    Upsert,
    /// Merge fields into existing documents; missing ids fail.
    Update,
}

impl ImportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportAction::Insert => "create",
            ImportAction::Upsert => "upsert",
            ImportAction::Update => "update",
        }
    }
}

impl fmt::Display for ImportAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of importing a single document.
///
/// Documents are identified by their `id`. A failed document carries the
/// engine's error message; the rest of the batch is unaffected.
#[derive(Debug, Clone)]
pub struct DocumentImportResult {
    /// The document's identifier.
    pub id: String,
    /// Whether the engine accepted the document.
    pub success: bool,
    /// Error if the document was rejected.
    pub error: Option<SearchIndexError>,
}

impl DocumentImportResult {
    pub fn succeeded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: SearchIndexError) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of an import containing aggregate statistics and individual results.
///
/// A bulk import is not atomic: some documents may be accepted while others
/// are rejected. Callers inspect `failed` and `results` to handle partial
/// failures.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    /// Total number of documents in the batch.
    pub total: usize,
    /// Number of accepted documents.
    pub succeeded: usize,
    /// Number of rejected documents.
    pub failed: usize,
    /// Individual results for each document.
    pub results: Vec<DocumentImportResult>,
}

impl ImportSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a summary from per-document results.
    pub fn from_results(results: Vec<DocumentImportResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentImportResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// A physical collection as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_documents: Option<u64>,
}

impl CollectionInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_documents: None,
        }
    }
}

/// An alias and the collection it currently resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasInfo {
    pub name: String,
    pub collection_name: String,
}
