//! # Audio Adapter
//!
//! Owns the audio backend and gates it behind an explicit handshake state
//! machine:
//!
//! ```text
//! Unbound -> HandshakePending -> HandshakeComplete -> Bound
//! ```
//!
//! Player creation is only forwarded once the adapter is `Bound`. Earlier
//! requests fail fast with [`AudioError::NotReady`].
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use super::backend::{
    AudioBackend, BackendError, NodeDescriptor, NodeEvent, NodeStatus, Player, PlayerRequest,
};
use super::packet::GatewayPacket;
use anyhow::Result;
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakeState {
    Unbound = 0,
    HandshakePending = 1,
    HandshakeComplete = 2,
    Bound = 3,
}

impl HandshakeState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => HandshakeState::HandshakePending,
            2 => HandshakeState::HandshakeComplete,
            3 => HandshakeState::Bound,
            _ => HandshakeState::Unbound,
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HandshakeState::Unbound => "unbound",
            HandshakeState::HandshakePending => "handshake pending",
            HandshakeState::HandshakeComplete => "handshake complete",
            HandshakeState::Bound => "bound",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio engine not ready ({state})")]
    NotReady { state: HandshakeState },
    #[error("audio handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Known-benign failure from re-running the backend's one-time init.
///
/// The backend defines the identity as a write-once property; a second init
/// surfaces as a property redefinition error, which means the handshake has
/// already happened.
pub fn is_redefinition_error(err: &anyhow::Error) -> bool {
    if matches!(
        err.downcast_ref::<BackendError>(),
        Some(BackendError::PropertyRedefinition)
    ) {
        return true;
    }
    let message = err.to_string().to_ascii_lowercase();
    message.contains("invalid property descriptor") || message.contains("cannot redefine property")
}

/// Returns a handshake dropped mid-init (stage timeout, task abort) to `Unbound`
struct PendingHandshake<'a> {
    state: &'a AtomicU8,
}

impl Drop for PendingHandshake<'_> {
    fn drop(&mut self) {
        let _ = self.state.compare_exchange(
            HandshakeState::HandshakePending as u8,
            HandshakeState::Unbound as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

pub struct AudioAdapter {
    backend: Arc<dyn AudioBackend>,
    nodes: Vec<NodeDescriptor>,
    state: AtomicU8,
    handshake_lock: tokio::sync::Mutex<()>,
    health: Mutex<Option<broadcast::Receiver<NodeEvent>>>,
}

impl AudioAdapter {
    /// Create an unbound adapter. Health events are subscribed immediately so
    /// nothing emitted during the handshake is lost.
    pub fn new(backend: Arc<dyn AudioBackend>, nodes: Vec<NodeDescriptor>) -> Self {
        let health = backend.subscribe();
        Self {
            backend,
            nodes,
            state: AtomicU8::new(HandshakeState::Unbound as u8),
            handshake_lock: tokio::sync::Mutex::new(()),
            health: Mutex::new(Some(health)),
        }
    }

    pub fn state(&self) -> HandshakeState {
        HandshakeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: HandshakeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.state() == HandshakeState::Bound
    }

    pub fn descriptors(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn nodes(&self) -> Vec<NodeStatus> {
        self.backend.nodes()
    }

    /// Register the bot identity with the backend, at most once.
    ///
    /// Returns `HandshakeComplete` whenever the handshake is done, including
    /// when it was already done before this call. Unexpected backend errors
    /// reset the adapter to `Unbound` and are returned to the caller.
    pub async fn handshake(&self, user_id: u64) -> Result<HandshakeState, AudioError> {
        let _guard = self.handshake_lock.lock().await;

        if self.state() >= HandshakeState::HandshakeComplete {
            debug!("Audio handshake already complete, skipping");
            return Ok(HandshakeState::HandshakeComplete);
        }

        self.set_state(HandshakeState::HandshakePending);
        let _pending = PendingHandshake { state: &self.state };

        match self.backend.init(user_id).await {
            Ok(()) => {
                self.set_state(HandshakeState::HandshakeComplete);
                info!("🎵 Audio handshake complete for user {user_id}");
                Ok(HandshakeState::HandshakeComplete)
            }
            Err(e) if is_redefinition_error(&e) => {
                self.set_state(HandshakeState::HandshakeComplete);
                debug!("Audio backend was already initialised: {e}");
                Ok(HandshakeState::HandshakeComplete)
            }
            Err(e) => {
                self.set_state(HandshakeState::Unbound);
                error!("❌ Audio system initialization failed: {e:#}");
                Err(AudioError::HandshakeFailed(format!("{e:#}")))
            }
        }
    }

    /// Attach node health logging and start accepting player requests
    pub fn bind(&self) -> Result<HandshakeState, AudioError> {
        match self.state() {
            HandshakeState::Bound => Ok(HandshakeState::Bound),
            HandshakeState::HandshakeComplete => {
                let receiver = self.health.lock().ok().and_then(|mut slot| slot.take());
                if let Some(receiver) = receiver {
                    tokio::spawn(log_node_health(receiver));
                }
                self.set_state(HandshakeState::Bound);
                info!("🎵 Audio engine bound to {} node(s)", self.nodes.len());
                Ok(HandshakeState::Bound)
            }
            state => Err(AudioError::NotReady { state }),
        }
    }

    pub async fn update_voice_state(&self, packet: &GatewayPacket) -> Result<()> {
        self.backend.update_voice_state(packet).await
    }

    pub async fn create_player(&self, request: PlayerRequest) -> Result<Player, AudioError> {
        let state = self.state();
        if state != HandshakeState::Bound {
            warn!(
                "Rejected player request for guild {}: audio engine {state}",
                request.guild_id
            );
            return Err(AudioError::NotReady { state });
        }

        self.backend
            .create_player(request)
            .await
            .map_err(|e| AudioError::Backend(format!("{e:#}")))
    }

    pub async fn destroy_player(&self, guild_id: u64) -> Result<(), AudioError> {
        let state = self.state();
        if state != HandshakeState::Bound {
            return Err(AudioError::NotReady { state });
        }

        self.backend
            .destroy_player(guild_id)
            .await
            .map_err(|e| AudioError::Backend(format!("{e:#}")))
    }
}

async fn log_node_health(mut events: broadcast::Receiver<NodeEvent>) {
    loop {
        match events.recv().await {
            Ok(NodeEvent::Connected { node }) => info!("🎵 Lavalink node \"{node}\" connected"),
            Ok(NodeEvent::Error { node, message }) => {
                error!("🔴 Lavalink node \"{node}\" error: {message}")
            }
            Err(RecvError::Lagged(skipped)) => warn!("Missed {skipped} audio node events"),
            Err(RecvError::Closed) => break,
        }
    }
}
