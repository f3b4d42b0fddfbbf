//! Test double for [`AudioBackend`]

use super::backend::{AudioBackend, BackendError, NodeEvent, NodeStatus, Player, PlayerRequest};
use super::packet::GatewayPacket;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

pub(crate) enum InitBehavior {
    Succeed,
    /// Identity was already set by an earlier run of the library
    AlreadyInitialized,
    Fail(&'static str),
    /// Never resolves, like a node that accepts the connection and goes quiet
    Hang,
}

pub(crate) struct MockBackend {
    behavior: InitBehavior,
    init_calls: AtomicUsize,
    player_calls: AtomicUsize,
    voice_packets: Mutex<Vec<GatewayPacket>>,
    events: broadcast::Sender<NodeEvent>,
}

impl MockBackend {
    pub(crate) fn new(behavior: InitBehavior) -> Self {
        let (events, _) = broadcast::channel(8);
        Self {
            behavior,
            init_calls: AtomicUsize::new(0),
            player_calls: AtomicUsize::new(0),
            voice_packets: Mutex::new(Vec::new()),
            events,
        }
    }

    pub(crate) fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn player_calls(&self) -> usize {
        self.player_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn voice_packets(&self) -> Vec<GatewayPacket> {
        self.voice_packets.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    async fn init(&self, _user_id: u64) -> Result<()> {
        let calls = self.init_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            InitBehavior::Succeed if calls == 0 => Ok(()),
            InitBehavior::Succeed | InitBehavior::AlreadyInitialized => {
                Err(BackendError::PropertyRedefinition.into())
            }
            InitBehavior::Fail(message) => Err(anyhow!(*message)),
            InitBehavior::Hang => std::future::pending().await,
        }
    }

    async fn update_voice_state(&self, packet: &GatewayPacket) -> Result<()> {
        self.voice_packets.lock().unwrap().push(packet.clone());
        Ok(())
    }

    async fn create_player(&self, request: PlayerRequest) -> Result<Player> {
        self.player_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Player {
            guild_id: request.guild_id,
            voice_channel_id: request.voice_channel_id,
            text_channel_id: request.text_channel_id,
            node: "mock".to_string(),
        })
    }

    async fn destroy_player(&self, _guild_id: u64) -> Result<()> {
        Ok(())
    }

    fn nodes(&self) -> Vec<NodeStatus> {
        vec![NodeStatus {
            name: "mock".to_string(),
            connected: true,
        }]
    }

    fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }
}
