//! Audio backend contract
//!
//! The backend is the client library that talks to the audio nodes. The
//! adapter owns one and never lets callers reach it before the handshake.

use super::packet::GatewayPacket;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Connection parameters for one audio node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub secure: bool,
}

impl NodeDescriptor {
    pub fn rest_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Event stream endpoint; the node announces its session id here
    pub fn socket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}/v4/websocket", self.host, self.port)
    }
}

/// Node health notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Connected { node: String },
    Error { node: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub name: String,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRequest {
    pub guild_id: u64,
    pub voice_channel_id: u64,
    pub text_channel_id: u64,
    pub deaf: bool,
}

/// Playback session bound to one guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub guild_id: u64,
    pub voice_channel_id: u64,
    pub text_channel_id: u64,
    pub node: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// Raised when the identity is set a second time
    #[error("Invalid property descriptor: client user id is already defined")]
    PropertyRedefinition,
    #[error("audio client has no user id yet; call init first")]
    NotInitialized,
    #[error("no connected audio nodes available")]
    NoNodes,
    #[error("voice packet is missing guild_id")]
    MissingGuild,
}

/// Outbound path from the audio client to the gateway shard owning a guild
pub trait PacketSender: Send + Sync {
    fn send(&self, packet: GatewayPacket) -> Result<()>;
}

#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Register the bot identity. Not idempotent: a second call errors.
    async fn init(&self, user_id: u64) -> Result<()>;

    async fn update_voice_state(&self, packet: &GatewayPacket) -> Result<()>;

    async fn create_player(&self, request: PlayerRequest) -> Result<Player>;

    async fn destroy_player(&self, guild_id: u64) -> Result<()>;

    fn nodes(&self) -> Vec<NodeStatus>;

    fn subscribe(&self) -> broadcast::Receiver<NodeEvent>;
}
