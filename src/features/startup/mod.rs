//! # Startup Feature
//!
//! Ordered bootstrap with per-stage criticality, and the one-shot
//! session-ready sequence that runs once the gateway session is up.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.4.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Replace the startup notifier with staged bootstrap and session-ready sequences
//! - 1.1.0: Rich notifications when bot comes online

pub mod orchestrator;
pub mod process;
pub mod ready;
pub mod stage;

pub use orchestrator::{BootError, BootReport, Orchestrator, CRITICAL_EXIT_CODE};
pub use process::{process_stages, BootContext};
pub use ready::{run_ready_sequence, ReadyContext, ReadyReport, SessionReadyListener};
pub use stage::{Criticality, Stage};
