//! # Voice Signaling Relay
//!
//! Forwards voice state and voice server dispatches from the gateway to the
//! audio adapter, unmodified and in arrival order. Holds no state of its own.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use super::adapter::{AudioAdapter, HandshakeState};
use super::packet::{GatewayPacket, VOICE_SERVER_UPDATE, VOICE_STATE_UPDATE};
use log::{debug, warn};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Forwarded,
    /// Not a voice signaling packet
    Ignored,
    /// Arrived before the adapter was bound; no player can exist yet
    Dropped,
    Failed,
}

pub struct VoiceRelay {
    adapter: Arc<AudioAdapter>,
}

impl VoiceRelay {
    pub fn new(adapter: Arc<AudioAdapter>) -> Self {
        Self { adapter }
    }

    pub fn accepts(kind: Option<&str>) -> bool {
        matches!(kind, Some(VOICE_STATE_UPDATE) | Some(VOICE_SERVER_UPDATE))
    }

    pub async fn forward(&self, packet: &GatewayPacket) -> RelayOutcome {
        if !Self::accepts(packet.kind()) {
            return RelayOutcome::Ignored;
        }

        let state = self.adapter.state();
        if state < HandshakeState::Bound {
            debug!(
                "Dropping {} for guild {:?}: audio engine {state}",
                packet.kind().unwrap_or_default(),
                packet.guild_id()
            );
            return RelayOutcome::Dropped;
        }

        match self.adapter.update_voice_state(packet).await {
            Ok(()) => RelayOutcome::Forwarded,
            Err(e) => {
                warn!(
                    "Failed to relay {} to audio client: {e:#}",
                    packet.kind().unwrap_or_default()
                );
                RelayOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::audio::testing::{InitBehavior, MockBackend};
    use serde_json::json;

    async fn bound_relay() -> (VoiceRelay, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::new(InitBehavior::Succeed));
        let adapter = Arc::new(AudioAdapter::new(backend.clone(), Vec::new()));
        adapter.handshake(42).await.unwrap();
        adapter.bind().unwrap();
        (VoiceRelay::new(adapter), backend)
    }

    fn packet(kind: &str, seq: u64) -> GatewayPacket {
        GatewayPacket::dispatch(kind, json!({"guild_id": "1", "seq": seq}))
    }

    #[tokio::test]
    async fn test_unrelated_packets_never_forwarded() {
        let (relay, backend) = bound_relay().await;

        assert_eq!(
            relay.forward(&packet("MESSAGE_CREATE", 1)).await,
            RelayOutcome::Ignored
        );
        assert_eq!(
            relay.forward(&packet("GUILD_CREATE", 2)).await,
            RelayOutcome::Ignored
        );
        assert!(backend.voice_packets().is_empty());
    }

    #[tokio::test]
    async fn test_voice_packets_forwarded_in_order_exactly_once() {
        let (relay, backend) = bound_relay().await;
        let incoming = vec![
            packet(VOICE_STATE_UPDATE, 1),
            packet("MESSAGE_CREATE", 2),
            packet(VOICE_SERVER_UPDATE, 3),
            packet(VOICE_STATE_UPDATE, 4),
        ];

        for p in &incoming {
            relay.forward(p).await;
        }

        let forwarded = backend.voice_packets();
        let seqs: Vec<_> = forwarded.iter().map(|p| p.d["seq"].as_u64().unwrap()).collect();
        assert_eq!(seqs, vec![1, 3, 4]);
        // Forwarded unmodified
        assert_eq!(forwarded[1], incoming[2]);
    }

    #[tokio::test]
    async fn test_packets_before_bind_are_dropped() {
        let backend = Arc::new(MockBackend::new(InitBehavior::Succeed));
        let adapter = Arc::new(AudioAdapter::new(backend.clone(), Vec::new()));
        let relay = VoiceRelay::new(adapter.clone());

        assert_eq!(
            relay.forward(&packet(VOICE_STATE_UPDATE, 1)).await,
            RelayOutcome::Dropped
        );

        adapter.handshake(42).await.unwrap();
        assert_eq!(
            relay.forward(&packet(VOICE_STATE_UPDATE, 2)).await,
            RelayOutcome::Dropped
        );
        assert!(backend.voice_packets().is_empty());
    }

    #[test]
    fn test_accepts_only_voice_tags() {
        assert!(VoiceRelay::accepts(Some(VOICE_STATE_UPDATE)));
        assert!(VoiceRelay::accepts(Some(VOICE_SERVER_UPDATE)));
        assert!(!VoiceRelay::accepts(Some("TYPING_START")));
        assert!(!VoiceRelay::accepts(None));
    }
}
