//! Initialization status record
//!
//! One entry per bootstrap stage, appended as each stage completes.

use crate::features::startup::Criticality;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a single stage
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub criticality: Criticality,
    pub success: bool,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InitStatus {
    records: Vec<StageRecord>,
}

impl InitStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, stage: &str, criticality: Criticality) {
        self.records.push(StageRecord {
            stage: stage.to_string(),
            criticality,
            success: true,
            error: None,
            at: Utc::now(),
        });
    }

    pub fn record_failure(&mut self, stage: &str, criticality: Criticality, error: &anyhow::Error) {
        self.records.push(StageRecord {
            stage: stage.to_string(),
            criticality,
            success: false,
            error: Some(format!("{error:#}")),
            at: Utc::now(),
        });
    }

    /// Whether the most recent record for `stage` succeeded
    pub fn is_ready(&self, stage: &str) -> bool {
        self.records
            .iter()
            .rev()
            .find(|r| r.stage == stage)
            .map(|r| r.success)
            .unwrap_or(false)
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageRecord> {
        self.records.iter().filter(|r| !r.success)
    }

    /// True when every critical and degrading stage that ran succeeded.
    /// Best-effort failures do not count against overall health.
    pub fn critical_subset_ok(&self) -> bool {
        self.records
            .iter()
            .filter(|r| r.criticality != Criticality::BestEffort)
            .all(|r| r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_empty_status() {
        let status = InitStatus::new();
        assert!(status.records().is_empty());
        assert!(status.critical_subset_ok());
        assert!(!status.is_ready("database"));
    }

    #[test]
    fn test_records_preserve_order_and_errors() {
        let mut status = InitStatus::new();
        status.record_success("database", Criticality::Critical);
        status.record_failure(
            "commands",
            Criticality::Degrading,
            &anyhow!("registry unreachable"),
        );

        let stages: Vec<_> = status.records().iter().map(|r| r.stage.as_str()).collect();
        assert_eq!(stages, vec!["database", "commands"]);
        assert!(status.is_ready("database"));
        assert!(!status.is_ready("commands"));

        let failure = status.failures().next().unwrap();
        assert_eq!(failure.error.as_deref(), Some("registry unreachable"));
    }

    #[test]
    fn test_best_effort_failure_keeps_health() {
        let mut status = InitStatus::new();
        status.record_success("audio", Criticality::Degrading);
        status.record_failure("embeds", Criticality::BestEffort, &anyhow!("missing perms"));
        assert!(status.critical_subset_ok());

        status.record_failure("commands", Criticality::Degrading, &anyhow!("401"));
        assert!(!status.critical_subset_ok());
    }
}
