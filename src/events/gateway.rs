//! Gateway plumbing: the raw event handler and the voice gateway bridge
//!
//! serenity hands every decoded dispatch to [`GatewayHandler`], which fans it
//! out to the bound listeners. Voice signaling takes a separate path: shard
//! runners call [`VoiceBridge`] inline, one update at a time, so voice state
//! and voice server updates reach the relay in the order they arrived. The
//! bridge also owns each shard's outbound channel for op-4 voice packets.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::channel::mpsc::UnboundedSender;
use log::{debug, info, warn};
use serenity::gateway::InterMessage;
use serenity::client::bridge::voice::VoiceGatewayManager;
use serenity::model::event::Event;
use serenity::model::id::{GuildId, UserId};
use serenity::model::voice::VoiceState;
use serenity::prelude::{Context, RawEventHandler};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::router::EventRouter;
use crate::features::audio::{BackendError, GatewayPacket, PacketSender, RelayOutcome, VoiceRelay};

/// Shard that owns `guild_id` under the platform's sharding formula
pub fn shard_for_guild(guild_id: u64, total_shards: u64) -> u64 {
    if total_shards == 0 {
        0
    } else {
        (guild_id >> 22) % total_shards
    }
}

pub struct VoiceBridge {
    shards: DashMap<u64, UnboundedSender<InterMessage>>,
    total: AtomicU64,
    relay: RwLock<Option<Arc<VoiceRelay>>>,
}

impl VoiceBridge {
    pub fn new() -> Self {
        Self {
            shards: DashMap::new(),
            total: AtomicU64::new(1),
            relay: RwLock::new(None),
        }
    }

    /// Route voice signaling updates to the audio adapter from now on
    pub fn attach_relay(&self, relay: Arc<VoiceRelay>) {
        if let Ok(mut slot) = self.relay.write() {
            *slot = Some(relay);
        }
    }

    pub fn has_relay(&self) -> bool {
        self.relay.read().map(|r| r.is_some()).unwrap_or(false)
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total.max(1), Ordering::Release);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Relay half of the bridge; a no-op until the relay is attached
    pub async fn relay(&self, packet: GatewayPacket) -> RelayOutcome {
        let relay = self.relay.read().ok().and_then(|r| r.clone());
        match relay {
            Some(relay) => relay.forward(&packet).await,
            None => RelayOutcome::Ignored,
        }
    }
}

impl Default for VoiceBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceGatewayManager for VoiceBridge {
    async fn initialise(&self, shard_count: u64, user_id: UserId) {
        debug!("Voice bridge initialised for {user_id} across {shard_count} shard(s)");
        self.set_total(shard_count);
    }

    async fn register_shard(&self, shard_id: u64, sender: UnboundedSender<InterMessage>) {
        // A restarted runner brings a new channel; the old one is dead
        if self.shards.insert(shard_id, sender).is_some() {
            debug!("Replaced voice channel for restarted shard {shard_id}");
        } else {
            debug!("Registered voice channel for shard {shard_id}");
        }
    }

    async fn deregister_shard(&self, shard_id: u64) {
        self.shards.remove(&shard_id);
        debug!("Deregistered voice channel for shard {shard_id}");
    }

    async fn server_update(&self, guild_id: GuildId, endpoint: &Option<String>, token: &str) {
        self.relay(GatewayPacket::voice_server(guild_id.0, endpoint.as_deref(), token))
            .await;
    }

    async fn state_update(&self, guild_id: GuildId, voice_state: &VoiceState) {
        match GatewayPacket::voice_state(guild_id.0, voice_state) {
            Ok(packet) => {
                self.relay(packet).await;
            }
            Err(e) => warn!("Could not encode voice state for guild {guild_id}: {e}"),
        }
    }
}

/// Outbound voice packets go out on the shard owning the packet's guild
impl PacketSender for VoiceBridge {
    fn send(&self, packet: GatewayPacket) -> Result<()> {
        let guild_id = packet.guild_id().ok_or(BackendError::MissingGuild)?;
        let shard = shard_for_guild(guild_id, self.total());
        let sender = self
            .shards
            .get(&shard)
            .ok_or_else(|| anyhow!("no gateway shard connected for guild {guild_id}"))?;

        sender
            .unbounded_send(InterMessage::Json(serde_json::to_value(&packet)?))
            .map_err(|_| anyhow!("gateway shard {shard} stopped before guild {guild_id}'s packet was sent"))
    }
}

pub struct GatewayHandler {
    router: Arc<EventRouter>,
}

impl GatewayHandler {
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl RawEventHandler for GatewayHandler {
    async fn raw_event(&self, ctx: Context, event: Event) {
        if let Event::Ready(ready) = &event {
            if let Some([shard, total]) = ready.ready.shard {
                info!("⚡ Shard: {}/{}", shard + 1, total);
            }
        }

        self.router.dispatch(&ctx, &event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::audio::testing::{InitBehavior, MockBackend};
    use crate::features::audio::{
        AudioAdapter, AudioBackend, LavalinkClient, NodeDescriptor, VOICE_SERVER_UPDATE,
        VOICE_STATE_UPDATE,
    };
    use futures::channel::mpsc::unbounded;
    use serde_json::json;

    fn voice_state(guild: u64, user: u64, channel: Option<u64>) -> VoiceState {
        serde_json::from_value(json!({
            "channel_id": channel.map(|c| c.to_string()),
            "deaf": false,
            "guild_id": guild.to_string(),
            "mute": false,
            "self_deaf": true,
            "self_mute": false,
            "self_stream": false,
            "self_video": false,
            "session_id": "sess-1",
            "suppress": false,
            "user_id": user.to_string(),
            "request_to_speak_timestamp": null,
        }))
        .unwrap()
    }

    async fn bound_bridge(backend: Arc<dyn AudioBackend>) -> VoiceBridge {
        let adapter = Arc::new(AudioAdapter::new(backend, Vec::new()));
        adapter.handshake(42).await.unwrap();
        adapter.bind().unwrap();
        let bridge = VoiceBridge::new();
        bridge.attach_relay(Arc::new(VoiceRelay::new(adapter)));
        bridge
    }

    #[test]
    fn test_shard_for_guild() {
        let guild = 81_384_788_765_712_384u64;
        assert_eq!(shard_for_guild(guild, 1), 0);
        assert_eq!(shard_for_guild(guild, 0), 0);
        assert_eq!(shard_for_guild(guild, 4), (guild >> 22) % 4);
    }

    #[tokio::test]
    async fn test_total_never_zero() {
        let bridge = VoiceBridge::new();
        assert_eq!(bridge.total(), 1);
        bridge.initialise(0, UserId(42)).await;
        assert_eq!(bridge.total(), 1);
        bridge.initialise(3, UserId(42)).await;
        assert_eq!(bridge.total(), 3);
    }

    #[tokio::test]
    async fn test_interleaved_updates_reach_backend_in_arrival_order() {
        let backend = Arc::new(MockBackend::new(InitBehavior::Succeed));
        let bridge = bound_bridge(backend.clone()).await;

        bridge.state_update(GuildId(1), &voice_state(1, 42, None)).await;
        bridge
            .server_update(GuildId(2), &Some("us.example:443".to_string()), "tok-2")
            .await;
        bridge.state_update(GuildId(1), &voice_state(1, 42, Some(5))).await;
        bridge
            .server_update(GuildId(1), &Some("eu.example:443".to_string()), "tok-1")
            .await;

        let forwarded = backend.voice_packets();
        let seen: Vec<_> = forwarded
            .iter()
            .map(|p| (p.kind().unwrap().to_string(), p.guild_id().unwrap()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (VOICE_STATE_UPDATE.to_string(), 1),
                (VOICE_SERVER_UPDATE.to_string(), 2),
                (VOICE_STATE_UPDATE.to_string(), 1),
                (VOICE_SERVER_UPDATE.to_string(), 1),
            ]
        );
        assert!(forwarded[0].d["channel_id"].is_null());
        assert_eq!(forwarded[2].d["channel_id"], "5");
        assert_eq!(forwarded[3].d["token"], "tok-1");
    }

    #[tokio::test]
    async fn test_leave_then_rejoin_keeps_the_new_session() {
        let node = NodeDescriptor {
            name: "Primary-Node".to_string(),
            host: "127.0.0.1".to_string(),
            port: 1,
            password: "pw".to_string(),
            secure: false,
        };
        let bridge = Arc::new(VoiceBridge::new());
        let lavalink = Arc::new(LavalinkClient::new(vec![node], bridge.clone()));
        let adapter = Arc::new(AudioAdapter::new(lavalink.clone(), Vec::new()));
        adapter.handshake(42).await.unwrap();
        adapter.bind().unwrap();
        bridge.attach_relay(Arc::new(VoiceRelay::new(adapter)));

        bridge.state_update(GuildId(1), &voice_state(1, 42, None)).await;
        bridge.state_update(GuildId(1), &voice_state(1, 42, Some(5))).await;
        bridge
            .server_update(GuildId(1), &Some("eu.example:443".to_string()), "tok")
            .await;

        let session = lavalink.voice_session(1).unwrap();
        assert_eq!(session.channel_id, Some(5));
        assert!(session.is_complete());
    }

    #[tokio::test]
    async fn test_updates_before_relay_attached_are_ignored() {
        let bridge = VoiceBridge::new();
        assert!(!bridge.has_relay());
        assert_eq!(
            bridge.relay(GatewayPacket::voice_server(1, None, "tok")).await,
            RelayOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn test_restarted_shard_receives_packets() {
        let bridge = VoiceBridge::new();
        let (old_tx, mut old_rx) = unbounded();
        let (new_tx, mut new_rx) = unbounded();

        bridge.register_shard(0, old_tx).await;
        bridge.register_shard(0, new_tx).await;
        assert_eq!(bridge.shard_count(), 1);

        bridge
            .send(GatewayPacket::voice_join(7, Some(8), false, true))
            .unwrap();

        let Ok(Some(InterMessage::Json(value))) = new_rx.try_next() else {
            panic!("live shard did not receive the voice packet");
        };
        assert_eq!(value["op"], 4);
        assert_eq!(value["d"]["channel_id"], "8");
        // The replaced channel was dropped, so its receiver sees a closed stream
        assert!(matches!(old_rx.try_next(), Ok(None)));
    }

    #[tokio::test]
    async fn test_send_without_shard_fails() {
        let bridge = VoiceBridge::new();
        let (tx, _rx) = unbounded();
        bridge.register_shard(0, tx).await;
        bridge.deregister_shard(0).await;

        let err = bridge
            .send(GatewayPacket::voice_join(7, Some(8), false, true))
            .unwrap_err();
        assert!(err.to_string().contains("guild 7"));

        let err = bridge
            .send(GatewayPacket::dispatch(VOICE_STATE_UPDATE, json!({})))
            .unwrap_err();
        assert!(err.downcast_ref::<BackendError>().is_some());
    }
}
