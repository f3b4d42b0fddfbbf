//! # Process Bootstrap
//!
//! The fixed startup order: store, command discovery, event binding,
//! resource monitor, audio wiring, login. The audio adapter is built here
//! once and handed by reference to the relay, the commands and the
//! session-ready listener.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use log::info;
use serenity::http::Http;
use serenity::prelude::GatewayIntents;
use serenity::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::ready::SessionReadyListener;
use super::stage::{Criticality, Stage};
use crate::commands::handlers;
use crate::commands::{
    CommandCatalog, CommandContext, CommandEntry, CommandPublisher, RegistryClient, RegistryScope,
    SerenityCommandRegistry,
};
use crate::core::store::Store;
use crate::core::Config;
use crate::events::{self, EventRouter, GatewayHandler, VoiceBridge};
use crate::features::audio::{AudioAdapter, AudioBackend, LavalinkClient, VoiceRelay};
use crate::features::resources::ResourceMonitor;

/// Everything the process stages build and share
pub struct BootContext {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub router: Arc<EventRouter>,
    pub voice: Arc<VoiceBridge>,
    pub adapter: Arc<AudioAdapter>,
    pub publisher: CommandPublisher,
    pub command_ctx: Arc<CommandContext>,
    /// Set by the command discovery stage
    pub catalog: Option<Arc<CommandCatalog>>,
    pub monitor: Option<JoinHandle<()>>,
    /// Set by the login stage; started by the caller after bootstrap
    pub client: Option<Client>,
    command_source: fn() -> Vec<CommandEntry>,
}

impl BootContext {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let voice = Arc::new(VoiceBridge::new());
        let backend = Arc::new(LavalinkClient::new(config.audio_nodes(), voice.clone()));
        let http = Arc::new(Http::new(&config.discord_token));
        let registry = Arc::new(SerenityCommandRegistry::new(http));
        Self::with_parts(config, store, voice, backend, registry)
    }

    /// Assemble with explicit collaborators
    pub fn with_parts(
        config: Config,
        store: Arc<dyn Store>,
        voice: Arc<VoiceBridge>,
        backend: Arc<dyn AudioBackend>,
        registry: Arc<dyn RegistryClient>,
    ) -> Self {
        // Constructed unbound; no I/O happens until the ready handshake
        let adapter = Arc::new(AudioAdapter::new(backend, config.audio_nodes()));
        let publisher =
            CommandPublisher::new(registry, RegistryScope::from_guild(config.discord_guild_id));
        let command_ctx = Arc::new(CommandContext::new(
            adapter.clone(),
            config.command_prefix.clone(),
        ));

        Self {
            config,
            store,
            router: Arc::new(EventRouter::new()),
            voice,
            adapter,
            publisher,
            command_ctx,
            catalog: None,
            monitor: None,
            client: None,
            command_source: handlers::manifest,
        }
    }

    pub fn with_command_source(mut self, source: fn() -> Vec<CommandEntry>) -> Self {
        self.command_source = source;
        self
    }
}

pub struct DatabaseStage;

#[async_trait]
impl Stage<BootContext> for DatabaseStage {
    fn name(&self) -> &'static str {
        "database"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Critical
    }

    async fn run(&self, ctx: &mut BootContext) -> Result<()> {
        ctx.store.connect().await
    }
}

pub struct CommandDiscoveryStage;

#[async_trait]
impl Stage<BootContext> for CommandDiscoveryStage {
    fn name(&self) -> &'static str {
        "commands"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Degrading
    }

    async fn run(&self, ctx: &mut BootContext) -> Result<()> {
        let (catalog, _report) = CommandCatalog::load((ctx.command_source)());
        if catalog.is_empty() {
            bail!("no commands were loaded");
        }
        ctx.catalog = Some(Arc::new(catalog));
        Ok(())
    }
}

pub struct EventBindingStage;

#[async_trait]
impl Stage<BootContext> for EventBindingStage {
    fn name(&self) -> &'static str {
        "events"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Degrading
    }

    async fn run(&self, ctx: &mut BootContext) -> Result<()> {
        // Bind even without a catalog so `ready` still drives the handshake
        let catalog = ctx.catalog.clone().unwrap_or_default();
        let session_ready = Arc::new(SessionReadyListener::new(
            ctx.publisher.clone(),
            catalog.slash_schemas().to_vec(),
            ctx.store.clone(),
            ctx.command_ctx.clone(),
            ctx.config.stage_timeout,
        ));

        let report = ctx.router.bind_all(events::manifest(
            catalog,
            ctx.command_ctx.clone(),
            session_ready,
        ));
        if !report.rejected.is_empty() {
            bail!("unknown events in manifest: {}", report.rejected.join(", "));
        }
        Ok(())
    }
}

pub struct MemoryStage;

#[async_trait]
impl Stage<BootContext> for MemoryStage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn criticality(&self) -> Criticality {
        Criticality::BestEffort
    }

    async fn run(&self, ctx: &mut BootContext) -> Result<()> {
        let monitor = Arc::new(ResourceMonitor::new(ctx.config.memory_warn_mb));
        ctx.monitor = Some(monitor.start()?);
        Ok(())
    }
}

pub struct AudioWiringStage;

#[async_trait]
impl Stage<BootContext> for AudioWiringStage {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Degrading
    }

    async fn run(&self, ctx: &mut BootContext) -> Result<()> {
        if ctx.adapter.descriptors().is_empty() {
            bail!("no audio nodes configured");
        }
        ctx.voice
            .attach_relay(Arc::new(VoiceRelay::new(ctx.adapter.clone())));

        for node in ctx.adapter.descriptors() {
            info!("🎵 Audio node \"{}\" at {}", node.name, node.rest_url());
        }
        Ok(())
    }
}

pub struct LoginStage;

impl LoginStage {
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_VOICE_STATES
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::GUILD_PRESENCES
    }
}

#[async_trait]
impl Stage<BootContext> for LoginStage {
    fn name(&self) -> &'static str {
        "login"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Critical
    }

    async fn run(&self, ctx: &mut BootContext) -> Result<()> {
        let handler = GatewayHandler::new(ctx.router.clone());
        let client = Client::builder(&ctx.config.discord_token, Self::intents())
            .raw_event_handler(handler)
            .voice_manager_arc(ctx.voice.clone())
            .await
            .context("Client creation failed")?;

        let user = client
            .cache_and_http
            .http
            .get_current_user()
            .await
            .context("Failed to authenticate with the bot token")?;
        info!("🔑 Authenticated as {} ({})", user.name, user.id);

        ctx.client = Some(client);
        Ok(())
    }
}

pub fn process_stages() -> Vec<Box<dyn Stage<BootContext>>> {
    vec![
        Box::new(DatabaseStage),
        Box::new(CommandDiscoveryStage),
        Box::new(EventBindingStage),
        Box::new(MemoryStage),
        Box::new(AudioWiringStage),
        Box::new(LoginStage),
    ]
}
