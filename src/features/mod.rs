//! # Features
//!
//! - `audio`: audio node client, handshake-gated adapter, voice relay
//! - `presence`: status line and central embed reset
//! - `resources`: process memory monitor
//! - `startup`: bootstrap orchestration and the session-ready sequence

pub mod audio;
pub mod presence;
pub mod resources;
pub mod startup;

pub use audio::{AudioAdapter, AudioError, HandshakeState, LavalinkClient, VoiceRelay};
pub use presence::{PresenceSink, SerenityPresence};
pub use resources::ResourceMonitor;
pub use startup::{BootContext, BootError, Criticality, Orchestrator, ReadyReport};
