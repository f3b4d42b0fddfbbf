//! # Resource Monitor
//!
//! Samples the bot process's resident memory and warns when it crosses the
//! configured threshold. Started as a best-effort bootstrap stage.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::task::JoinHandle;

pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

const BYTES_PER_MB: u64 = 1024 * 1024;

pub fn exceeds_threshold(memory_bytes: u64, warn_mb: u64) -> bool {
    warn_mb > 0 && memory_bytes > warn_mb.saturating_mul(BYTES_PER_MB)
}

pub struct ResourceMonitor {
    warn_mb: u64,
    interval: Duration,
    system: Mutex<System>,
}

impl ResourceMonitor {
    pub fn new(warn_mb: u64) -> Self {
        Self::with_interval(warn_mb, SAMPLE_INTERVAL)
    }

    pub fn with_interval(warn_mb: u64, interval: Duration) -> Self {
        Self {
            warn_mb,
            interval,
            system: Mutex::new(System::new()),
        }
    }

    pub fn warn_mb(&self) -> u64 {
        self.warn_mb
    }

    /// Resident memory of this process in bytes
    pub fn sample(&self) -> Result<u64> {
        let pid = sysinfo::get_current_pid().map_err(|e| anyhow!("no current pid: {e}"))?;
        let mut sys = self
            .system
            .lock()
            .map_err(|_| anyhow!("resource monitor lock poisoned"))?;
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        sys.process(pid)
            .map(|p| p.memory())
            .ok_or_else(|| anyhow!("process {pid} not found"))
    }

    /// Take one sample now, then keep sampling in the background
    pub fn start(self: std::sync::Arc<Self>) -> Result<JoinHandle<()>> {
        let memory = self.sample()?;
        info!(
            "🧠 Resource monitor started: {} MB resident, warning above {} MB",
            memory / BYTES_PER_MB,
            self.warn_mb
        );

        Ok(tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                match self.sample() {
                    Ok(memory) if exceeds_threshold(memory, self.warn_mb) => warn!(
                        "⚠️ Memory usage {} MB exceeds {} MB",
                        memory / BYTES_PER_MB,
                        self.warn_mb
                    ),
                    Ok(memory) => debug!("Memory usage {} MB", memory / BYTES_PER_MB),
                    Err(e) => warn!("Failed to sample memory: {e}"),
                }
            }
        }))
    }
}
