//! Consolidated run report.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use store_indexer_shared::{SyncRunResult, SyncStatus};

/// Width of the header rule printed above each entity run.
pub const RULE_WIDTH: usize = 50;

/// Format a duration as `hh:mm:ss`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Per-entity statistics block printed after a single entity sync.
pub fn render_stats(result: &SyncRunResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total batch imported: {}", result.iterations);
    let _ = writeln!(out, "Total import: {}", result.total_imports);
    let _ = writeln!(out, "Successful import: {}", result.successful_imports);
    if result.failed_imports > 0 {
        let _ = writeln!(out, "Failed import: {}", result.failed_imports);
    }
    let _ = writeln!(out, "Total time spent: {}", format_elapsed(result.elapsed));
    out
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub results: Vec<SyncRunResult>,
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

impl SyncReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            elapsed: Duration::ZERO,
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: SyncRunResult) {
        self.results.push(result);
    }

    pub fn completed(&self) -> usize {
        self.results.iter().filter(|r| r.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    /// True when no entity type failed. Skipped entity types do not count.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Human-readable summary table, one row per entity type.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
        let _ = writeln!(out, "Sync summary");
        let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
        let _ = writeln!(
            out,
            "{:<16} {:<10} {:>8} {:>8} {:>10}  {}",
            "Entity", "Status", "Imported", "Failed", "Elapsed", "Note"
        );

        for result in &self.results {
            let _ = writeln!(
                out,
                "{:<16} {:<10} {:>8} {:>8} {:>10}  {}",
                result.entity_type.display_name(),
                result.status.label(),
                result.successful_imports,
                result.failed_imports,
                format_elapsed(result.elapsed),
                note(result)
            );
        }

        let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
        let _ = writeln!(
            out,
            "Successful: {} / Failed: {} / Skipped: {}",
            self.completed(),
            self.failed(),
            self.skipped()
        );
        let _ = writeln!(out, "Total time spent: {}", format_elapsed(self.elapsed));
        out
    }
}

fn note(result: &SyncRunResult) -> String {
    match &result.status {
        SyncStatus::Skipped { reason } => reason.to_string(),
        SyncStatus::Failed { error } => error.clone(),
        SyncStatus::Completed => {
            let mut parts = Vec::new();
            if result.truncated {
                parts.push("truncated at safety limit".to_string());
            }
            if result.memory_reclaims > 0 {
                parts.push(format!("{} memory reclaims", result.memory_reclaims));
            }
            if result.promoted {
                parts.push("promoted".to_string());
            }
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_indexer_shared::{EntityType, SkipReason};

    fn report() -> SyncReport {
        let mut report = SyncReport::new(Utc::now());

        let mut products = SyncRunResult::new(EntityType::Product);
        products.successful_imports = 120;
        products.promoted = true;
        products.memory_reclaims = 2;
        report.push(products);

        report.push(SyncRunResult::skipped(EntityType::Taxonomy, SkipReason::DisabledByFilter));
        report.push(SyncRunResult::failed(EntityType::Menu, "connection refused"));
        report.elapsed = Duration::from_secs(3725);
        report
    }

    #[test]
    fn test_counts_and_success() {
        let report = report();

        assert_eq!(report.completed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_skips_do_not_fail_the_run() {
        let mut report = SyncReport::new(Utc::now());
        report.push(SyncRunResult::new(EntityType::SiteInfo));
        report.push(SyncRunResult::skipped(EntityType::Taxonomy, SkipReason::DisabledByFilter));

        assert!(report.is_success());
    }

    #[test]
    fn test_summary_lists_every_entity() {
        let summary = report().render_summary();

        assert!(summary.contains("Products"));
        assert!(summary.contains("disabled_by_filter"));
        assert!(summary.contains("connection refused"));
        assert!(summary.contains("2 memory reclaims"));
        assert!(summary.contains("Successful: 1 / Failed: 1 / Skipped: 1"));
        assert!(summary.contains("Total time spent: 01:02:05"));
    }

    #[test]
    fn test_render_stats() {
        let mut result = SyncRunResult::new(EntityType::Product);
        result.iterations = 3;
        result.total_imports = 150;
        result.successful_imports = 150;
        result.elapsed = Duration::from_secs(61);

        let stats = render_stats(&result);

        assert!(stats.contains("Total batch imported: 3"));
        assert!(stats.contains("Total import: 150"));
        assert!(stats.contains("Successful import: 150"));
        assert!(stats.contains("Total time spent: 00:01:01"));
        assert!(!stats.contains("Failed import"));
    }
}
