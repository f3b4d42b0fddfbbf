//! # Audio Feature
//!
//! Audio node client, handshake-gated adapter and the voice signaling relay.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod adapter;
pub mod backend;
pub mod lavalink;
pub mod packet;
pub mod relay;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{is_redefinition_error, AudioAdapter, AudioError, HandshakeState};
pub use backend::{
    AudioBackend, BackendError, NodeDescriptor, NodeEvent, NodeStatus, PacketSender, Player,
    PlayerRequest,
};
pub use lavalink::{LavalinkClient, VoiceSession};
pub use packet::{GatewayPacket, VOICE_SERVER_UPDATE, VOICE_STATE_UPDATE};
pub use relay::{RelayOutcome, VoiceRelay};
