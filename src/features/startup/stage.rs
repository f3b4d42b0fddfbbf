//! Bootstrap stage trait
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// How a stage failure affects the rest of startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure aborts startup and the process exits non-zero
    Critical,
    /// Failure is recorded and startup continues, but the run is reported as degraded
    Degrading,
    /// Failure is logged and recorded; overall health is unaffected
    BestEffort,
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criticality::Critical => write!(f, "critical"),
            Criticality::Degrading => write!(f, "degrading"),
            Criticality::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// One step of a startup sequence
///
/// Stages share a mutable context `C` so later stages can use what earlier
/// stages built (the command catalog, the platform client, ...).
///
/// # Example
///
/// ```ignore
/// struct ConnectStore;
///
/// #[async_trait]
/// impl Stage<BootContext> for ConnectStore {
///     fn name(&self) -> &'static str {
///         "database"
///     }
///
///     fn criticality(&self) -> Criticality {
///         Criticality::Critical
///     }
///
///     async fn run(&self, ctx: &mut BootContext) -> Result<()> {
///         ctx.store.connect().await
///     }
/// }
/// ```
#[async_trait]
pub trait Stage<C: Send>: Send + Sync {
    fn name(&self) -> &'static str;

    fn criticality(&self) -> Criticality;

    async fn run(&self, ctx: &mut C) -> Result<()>;
}
