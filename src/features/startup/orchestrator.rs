//! # Bootstrap Orchestrator
//!
//! Runs stages strictly in order. Critical failures (including timeouts) abort
//! the sequence; degrading and best-effort failures are recorded and skipped.
//! Nothing is retried here.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use super::stage::{Criticality, Stage};
use crate::core::status::InitStatus;
use anyhow::anyhow;
use log::{error, info, warn};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;

/// Exit status used when a critical stage fails
pub const CRITICAL_EXIT_CODE: i32 = 1;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("critical stage '{stage}' failed: {error:#}")]
    CriticalStage {
        stage: &'static str,
        error: anyhow::Error,
        status: InitStatus,
    },
}

impl BootError {
    pub fn exit_code(&self) -> i32 {
        CRITICAL_EXIT_CODE
    }

    pub fn status(&self) -> &InitStatus {
        match self {
            BootError::CriticalStage { status, .. } => status,
        }
    }
}

/// Result of a completed sequence
#[derive(Debug, Clone)]
pub struct BootReport {
    pub status: InitStatus,
    pub elapsed: Duration,
    /// All critical and degrading stages succeeded
    pub healthy: bool,
}

pub struct Orchestrator<C: Send> {
    label: &'static str,
    stages: Vec<Box<dyn Stage<C>>>,
    stage_timeout: Duration,
}

impl<C: Send> Orchestrator<C> {
    pub fn new(label: &'static str, stages: Vec<Box<dyn Stage<C>>>, stage_timeout: Duration) -> Self {
        Self {
            label,
            stages,
            stage_timeout,
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, ctx: &mut C) -> Result<BootReport, BootError> {
        let started = Instant::now();
        let mut status = InitStatus::new();

        info!("🚀 {}: running {} stages", self.label, self.stages.len());

        for stage in &self.stages {
            let name = stage.name();
            let criticality = stage.criticality();

            let outcome = match timeout(self.stage_timeout, stage.run(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!(
                    "stage '{name}' timed out after {}s",
                    self.stage_timeout.as_secs_f32()
                )),
            };

            match outcome {
                Ok(()) => {
                    info!("✅ {}: {name} ready", self.label);
                    status.record_success(name, criticality);
                }
                Err(e) => {
                    status.record_failure(name, criticality, &e);
                    match criticality {
                        Criticality::Critical => {
                            error!("💥 {}: critical stage '{name}' failed: {e:#}", self.label);
                            return Err(BootError::CriticalStage {
                                stage: name,
                                error: e,
                                status,
                            });
                        }
                        Criticality::Degrading | Criticality::BestEffort => {
                            error!("❌ {}: {name} failed ({criticality}): {e:#}", self.label);
                        }
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        let healthy = status.critical_subset_ok();

        if healthy {
            info!(
                "✅ {} completed successfully in {}ms",
                self.label,
                elapsed.as_millis()
            );
        } else {
            let failed: Vec<_> = status
                .failures()
                .filter(|r| r.criticality != Criticality::BestEffort)
                .map(|r| r.stage.as_str())
                .collect();
            warn!(
                "⚠️ {} finished with some subsystem failures: {}",
                self.label,
                failed.join(", ")
            );
        }

        Ok(BootReport {
            status,
            elapsed,
            healthy,
        })
    }
}
