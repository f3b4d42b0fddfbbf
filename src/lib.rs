// Core layer - shared types and configuration
pub mod core;

// Features layer - audio, presence, resources, startup
pub mod features;

// Application layer
pub mod commands;
pub mod events;

pub use core::Config;

pub use features::{
    // Audio
    AudioAdapter, AudioError, HandshakeState, LavalinkClient, VoiceRelay,
    // Startup
    BootContext, BootError, Criticality, Orchestrator, ReadyReport,
};
