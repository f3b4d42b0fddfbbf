//! # Lavalink Client
//!
//! Node-side bookkeeping for the audio backend: identity, one event socket
//! per node, per-guild voice sessions and players. Decoding and streaming
//! happen on the node itself.
//!
//! Each node's socket is kept open by a background task. A dropped or
//! refused connection is retried every `retry_interval`, or immediately when
//! a player request finds no node connected. Once a guild's voice session is
//! complete it is pushed to the node that hosts the guild's player.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Event socket with reconnects replaces the one-off version check; voice sessions are pushed to the node
//! - 1.0.0: Initial creation

use super::backend::{
    AudioBackend, BackendError, NodeDescriptor, NodeEvent, NodeStatus, PacketSender, Player,
    PlayerRequest,
};
use super::packet::{snowflake, GatewayPacket, VOICE_SERVER_UPDATE, VOICE_STATE_UPDATE};
use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Notify};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type NodeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

const CLIENT_NAME: &str = concat!("music-bot/", env!("CARGO_PKG_VERSION"));

const EVENT_BUFFER: usize = 64;

/// Voice connection state for one guild, assembled from relayed packets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceSession {
    pub channel_id: Option<u64>,
    pub session_id: Option<String>,
    pub token: Option<String>,
    pub endpoint: Option<String>,
}

impl VoiceSession {
    /// Both halves of the handoff have arrived
    pub fn is_complete(&self) -> bool {
        self.session_id.is_some() && self.token.is_some() && self.endpoint.is_some()
    }

    /// Player voice update body, once the session is complete
    pub fn voice_update(&self) -> Option<Value> {
        Some(json!({
            "voice": {
                "token": self.token.as_deref()?,
                "endpoint": self.endpoint.as_deref()?,
                "sessionId": self.session_id.as_deref()?,
            }
        }))
    }
}

/// Messages the node sends over its event socket
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum NodeMessage {
    #[serde(rename_all = "camelCase")]
    Ready { session_id: String, resumed: bool },
    // stats, playerUpdate, event
    #[serde(other)]
    Other,
}

struct NodeHandle {
    descriptor: NodeDescriptor,
    connected: AtomicBool,
    session_id: RwLock<Option<String>>,
    retry: Notify,
}

impl NodeHandle {
    fn session_id(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|s| s.clone())
    }

    fn mark_up(&self, session_id: String) {
        if let Ok(mut slot) = self.session_id.write() {
            *slot = Some(session_id);
        }
        self.connected.store(true, Ordering::Release);
    }

    fn mark_down(&self) {
        self.connected.store(false, Ordering::Release);
        if let Ok(mut slot) = self.session_id.write() {
            *slot = None;
        }
    }

    fn player_url(&self, session_id: &str, guild_id: u64) -> String {
        format!(
            "{}/v4/sessions/{session_id}/players/{guild_id}",
            self.descriptor.rest_url()
        )
    }
}

pub struct LavalinkClient {
    nodes: Vec<Arc<NodeHandle>>,
    http: reqwest::Client,
    sender: Arc<dyn PacketSender>,
    user_id: OnceLock<u64>,
    sessions: DashMap<u64, VoiceSession>,
    players: DashMap<u64, Player>,
    events: broadcast::Sender<NodeEvent>,
    retry_interval: Duration,
}

impl LavalinkClient {
    pub fn new(nodes: Vec<NodeDescriptor>, sender: Arc<dyn PacketSender>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let nodes = nodes
            .into_iter()
            .map(|descriptor| {
                Arc::new(NodeHandle {
                    descriptor,
                    connected: AtomicBool::new(false),
                    session_id: RwLock::new(None),
                    retry: Notify::new(),
                })
            })
            .collect();

        Self {
            nodes,
            http: reqwest::Client::new(),
            sender,
            user_id: OnceLock::new(),
            sessions: DashMap::new(),
            players: DashMap::new(),
            events,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn voice_session(&self, guild_id: u64) -> Option<VoiceSession> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    pub fn player(&self, guild_id: u64) -> Option<Player> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    /// Keep one socket open per node for the rest of the process
    fn connect_nodes(&self, user_id: u64) {
        for node in &self.nodes {
            tokio::spawn(maintain_node(
                Arc::clone(node),
                user_id,
                self.events.clone(),
                self.retry_interval,
            ));
        }
    }

    /// Cut the reconnect wait short on every node that is currently down
    fn retry_disconnected(&self) {
        for node in self.nodes.iter().filter(|n| !n.connected.load(Ordering::Acquire)) {
            node.retry.notify_one();
        }
    }

    fn first_connected_node(&self) -> Option<&NodeDescriptor> {
        self.nodes
            .iter()
            .find(|n| n.connected.load(Ordering::Acquire))
            .map(|n| &n.descriptor)
    }

    fn node(&self, name: &str) -> Option<&NodeHandle> {
        self.nodes
            .iter()
            .find(|n| n.descriptor.name == name)
            .map(|n| n.as_ref())
    }

    /// Send the guild's voice session to its player's node, if both exist
    async fn push_voice_session(&self, guild_id: u64) -> Result<()> {
        let Some(body) = self.voice_session(guild_id).and_then(|s| s.voice_update()) else {
            return Ok(());
        };
        let Some(player) = self.player(guild_id) else {
            return Ok(());
        };
        let node = self
            .node(&player.node)
            .ok_or_else(|| anyhow!("player for guild {guild_id} is on unknown node {}", player.node))?;
        let session_id = node
            .session_id()
            .ok_or_else(|| anyhow!("node {} has no open session", player.node))?;

        let url = node.player_url(&session_id, guild_id);
        self.http
            .patch(&url)
            .header(AUTHORIZATION, &node.descriptor.password)
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("PATCH {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} rejected the voice update"))?;

        debug!("Voice session for guild {guild_id} sent to node {}", player.node);
        Ok(())
    }

    async fn delete_remote_player(&self, player: &Player) -> Result<()> {
        let Some(node) = self.node(&player.node) else {
            return Ok(());
        };
        let Some(session_id) = node.session_id() else {
            return Ok(());
        };

        let url = node.player_url(&session_id, player.guild_id);
        self.http
            .delete(&url)
            .header(AUTHORIZATION, &node.descriptor.password)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("DELETE {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} rejected the player removal"))?;
        Ok(())
    }

    #[cfg(test)]
    fn mark_connected(&self, name: &str, session_id: &str) {
        for node in self.nodes.iter().filter(|n| n.descriptor.name == name) {
            node.mark_up(session_id.to_string());
        }
    }
}

async fn open_socket(node: &NodeDescriptor, user_id: u64) -> Result<NodeSocket> {
    let mut request = node.socket_url().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert("Authorization", HeaderValue::from_str(&node.password)?);
    headers.insert("User-Id", HeaderValue::from_str(&user_id.to_string())?);
    headers.insert("Client-Name", HeaderValue::from_static(CLIENT_NAME));

    let (socket, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request))
        .await
        .with_context(|| format!("timed out connecting to {}", node.socket_url()))?
        .with_context(|| format!("failed to connect to {}", node.socket_url()))?;
    Ok(socket)
}

/// Read the node's socket until it closes; returns why it closed
async fn read_socket(
    node: &NodeHandle,
    mut socket: NodeSocket,
    events: &broadcast::Sender<NodeEvent>,
) -> String {
    let name = &node.descriptor.name;
    while let Some(message) = socket.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<NodeMessage>(&text) {
                Ok(NodeMessage::Ready {
                    session_id,
                    resumed,
                }) => {
                    debug!("Audio node {name} opened session {session_id} (resumed: {resumed})");
                    node.mark_up(session_id);
                    let _ = events.send(NodeEvent::Connected { node: name.clone() });
                }
                Ok(NodeMessage::Other) => {}
                Err(e) => debug!("Unreadable message from audio node {name}: {e}"),
            },
            Ok(Message::Close(frame)) => {
                return frame.map_or_else(
                    || "closed by node".to_string(),
                    |f| format!("closed by node ({}): {}", u16::from(f.code), f.reason),
                );
            }
            Ok(_) => {}
            Err(e) => return format!("socket error: {e}"),
        }
    }
    "connection closed".to_string()
}

async fn maintain_node(
    node: Arc<NodeHandle>,
    user_id: u64,
    events: broadcast::Sender<NodeEvent>,
    retry_interval: Duration,
) {
    let name = node.descriptor.name.clone();
    // Repeated failures while already down are reported once
    let mut reported_down = false;

    loop {
        let failure = match open_socket(&node.descriptor, user_id).await {
            Ok(socket) => {
                reported_down = false;
                let reason = read_socket(&node, socket, &events).await;
                node.mark_down();
                reason
            }
            Err(e) => format!("{e:#}"),
        };

        if reported_down {
            debug!("Audio node {name} still unreachable: {failure}");
        } else {
            reported_down = true;
            let _ = events.send(NodeEvent::Error {
                node: name.clone(),
                message: failure,
            });
        }

        tokio::select! {
            _ = tokio::time::sleep(retry_interval) => {}
            _ = node.retry.notified() => debug!("Reconnecting to audio node {name} on demand"),
        }
    }
}

#[async_trait]
impl AudioBackend for LavalinkClient {
    async fn init(&self, user_id: u64) -> Result<()> {
        self.user_id
            .set(user_id)
            .map_err(|_| BackendError::PropertyRedefinition)?;

        info!(
            "Audio client identity set to {user_id}, connecting {} node(s)",
            self.nodes.len()
        );
        self.connect_nodes(user_id);
        Ok(())
    }

    async fn update_voice_state(&self, packet: &GatewayPacket) -> Result<()> {
        let user_id = *self.user_id.get().ok_or(BackendError::NotInitialized)?;
        let guild_id = packet.guild_id().ok_or(BackendError::MissingGuild)?;

        match packet.kind() {
            Some(VOICE_STATE_UPDATE) => {
                // Other members' voice states are irrelevant to our session
                if snowflake(&packet.d, "user_id") != Some(user_id) {
                    return Ok(());
                }
                match snowflake(&packet.d, "channel_id") {
                    Some(channel_id) => {
                        let mut session = self.sessions.entry(guild_id).or_default();
                        session.channel_id = Some(channel_id);
                        session.session_id = packet
                            .d
                            .get("session_id")
                            .and_then(Value::as_str)
                            .map(str::to_string);
                        if let Some(mut player) = self.players.get_mut(&guild_id) {
                            player.voice_channel_id = channel_id;
                        }
                    }
                    None => {
                        self.sessions.remove(&guild_id);
                        if self.players.remove(&guild_id).is_some() {
                            debug!("Voice connection closed for guild {guild_id}, player dropped");
                        }
                        return Ok(());
                    }
                }
            }
            Some(VOICE_SERVER_UPDATE) => {
                let mut session = self.sessions.entry(guild_id).or_default();
                session.token = packet
                    .d
                    .get("token")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                session.endpoint = packet
                    .d
                    .get("endpoint")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            _ => return Ok(()),
        }

        self.push_voice_session(guild_id).await
    }

    async fn create_player(&self, request: PlayerRequest) -> Result<Player> {
        if self.user_id.get().is_none() {
            return Err(BackendError::NotInitialized.into());
        }
        if let Some(existing) = self.players.get(&request.guild_id) {
            return Ok(existing.clone());
        }

        let Some(node) = self.first_connected_node() else {
            self.retry_disconnected();
            return Err(BackendError::NoNodes.into());
        };
        let node = node.name.clone();

        self.sender.send(GatewayPacket::voice_join(
            request.guild_id,
            Some(request.voice_channel_id),
            false,
            request.deaf,
        ))?;

        let player = Player {
            guild_id: request.guild_id,
            voice_channel_id: request.voice_channel_id,
            text_channel_id: request.text_channel_id,
            node,
        };
        self.players.insert(request.guild_id, player.clone());
        info!(
            "🎵 Player created for guild {} on node {}",
            request.guild_id, player.node
        );

        // Already in the channel: the session will not be announced again
        if let Err(e) = self.push_voice_session(request.guild_id).await {
            warn!("Voice session for guild {} not sent: {e:#}", request.guild_id);
        }
        Ok(player)
    }

    async fn destroy_player(&self, guild_id: u64) -> Result<()> {
        let Some((_, player)) = self.players.remove(&guild_id) else {
            return Ok(());
        };
        self.sessions.remove(&guild_id);
        self.sender
            .send(GatewayPacket::voice_join(guild_id, None, false, false))?;
        if let Err(e) = self.delete_remote_player(&player).await {
            warn!("Node {} kept the player for guild {guild_id}: {e:#}", player.node);
        }
        info!("Player destroyed for guild {guild_id}");
        Ok(())
    }

    fn nodes(&self) -> Vec<NodeStatus> {
        self.nodes
            .iter()
            .map(|n| NodeStatus {
                name: n.descriptor.name.clone(),
                connected: n.connected.load(Ordering::Acquire),
            })
            .collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }
}
