//! # Event System
//!
//! Binds gateway events to listeners and bridges the shards' voice
//! signaling to the audio adapter.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod gateway;
pub mod manifest;
pub mod router;

pub use gateway::{shard_for_guild, GatewayHandler, VoiceBridge};
pub use manifest::{manifest, parse_invocation};
pub use router::{event_name, BindReport, EventBinding, EventListener, EventRouter, KNOWN_EVENTS};
