//! Per-entity outcome of a sync run.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EntityType;

/// Why an entity type was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DisabledByFilter,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::DisabledByFilter => "disabled_by_filter",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of one entity type's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    Completed,
    Skipped { reason: SkipReason },
    Failed { error: String },
}

impl SyncStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Completed => "completed",
            SyncStatus::Skipped { .. } => "skipped",
            SyncStatus::Failed { .. } => "failed",
        }
    }
}

/// Outcome of syncing one entity type.
///
/// This is the only artifact retained after a run; it is logged and printed,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRunResult {
    pub entity_type: EntityType,
    /// Entity key of the collection, e.g. "taxonomy".
    pub collection: String,
    pub status: SyncStatus,
    pub iterations: usize,
    /// Records seen from the source (including ones that failed to transform).
    pub total_records: usize,
    /// Documents sent to the search engine.
    pub total_imports: usize,
    /// Documents the engine accepted.
    pub successful_imports: usize,
    /// Documents rejected by the engine or dropped by the transform.
    pub failed_imports: usize,
    /// The loop stopped at its safety limit.
    pub truncated: bool,
    /// Times batch buffers were released under memory pressure.
    #[serde(default)]
    pub memory_reclaims: usize,
    /// Physical collection the documents were written to.
    pub target_collection: Option<String>,
    /// The alias was repointed to `target_collection` after this run.
    pub promoted: bool,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl SyncRunResult {
    /// A fresh, zeroed result for `entity_type`, marked completed.
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            collection: entity_type.as_str().to_string(),
            status: SyncStatus::Completed,
            iterations: 0,
            total_records: 0,
            total_imports: 0,
            successful_imports: 0,
            failed_imports: 0,
            truncated: false,
            memory_reclaims: 0,
            target_collection: None,
            promoted: false,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn skipped(entity_type: EntityType, reason: SkipReason) -> Self {
        Self {
            status: SyncStatus::Skipped { reason },
            ..Self::new(entity_type)
        }
    }

    pub fn failed(entity_type: EntityType, error: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Failed {
                error: error.into(),
            },
            ..Self::new(entity_type)
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, SyncStatus::Completed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, SyncStatus::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SyncStatus::Failed { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.status {
            SyncStatus::Skipped { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            SyncStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SyncStatus::Failed {
            error: error.into(),
        };
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_result() {
        let result = SyncRunResult::skipped(EntityType::Taxonomy, SkipReason::DisabledByFilter);

        assert_eq!(result.collection, "taxonomy");
        assert!(result.is_skipped());
        assert!(!result.is_failed());
        assert_eq!(result.skip_reason().map(|r| r.as_str()), Some("disabled_by_filter"));
        assert_eq!(result.total_imports, 0);
    }

    #[test]
    fn test_mark_failed() {
        let mut result = SyncRunResult::new(EntityType::Product);
        assert!(result.is_completed());

        result.mark_failed("connection refused");
        assert!(result.is_failed());
        assert_eq!(result.error(), Some("connection refused"));
        assert_eq!(result.status.label(), "failed");
    }

    #[test]
    fn test_serialized_status_shape() {
        let result = SyncRunResult::skipped(EntityType::Menu, SkipReason::DisabledByFilter);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["status"]["status"], "skipped");
        assert_eq!(value["status"]["reason"], "disabled_by_filter");
        assert_eq!(value["entity_type"], "menu");
    }
}
