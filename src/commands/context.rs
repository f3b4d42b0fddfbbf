//! Shared context for command handlers
//!
//! - **Version**: 2.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 2.0.0: Carry the audio adapter and the session-ready report
//! - 1.0.0: Initial implementation with core shared state

use crate::features::audio::AudioAdapter;
use crate::features::startup::ReadyReport;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Shared context for all command handlers
///
/// The adapter is injected here rather than hung off the client, so every
/// handler sees the same instance the session-ready sequence advances.
#[derive(Clone)]
pub struct CommandContext {
    pub adapter: Arc<AudioAdapter>,
    pub prefix: String,
    pub start_time: Instant,
    /// Filled in once the session-ready sequence has run
    pub ready_report: Arc<RwLock<Option<ReadyReport>>>,
}

impl CommandContext {
    pub fn new(adapter: Arc<AudioAdapter>, prefix: impl Into<String>) -> Self {
        Self {
            adapter,
            prefix: prefix.into(),
            start_time: Instant::now(),
            ready_report: Arc::new(RwLock::new(None)),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
