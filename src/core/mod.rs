//! # Core Module
//!
//! Configuration, the persistent store and the initialization status record.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.7.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Add store and status modules; YAML + env configuration
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod status;
pub mod store;

// Re-export commonly used items
pub use config::Config;
pub use status::{InitStatus, StageRecord};
pub use store::{CentralEmbed, SqliteStore, Store};
