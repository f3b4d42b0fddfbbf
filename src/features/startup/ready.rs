//! # Session-Ready Sequence
//!
//! Runs once, on the canonical `ready` event: audio handshake and bind,
//! slash command publication, central embed reset, then the status line.
//! Nothing here is critical; every failure is recorded in the report.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use serenity::model::event::Event;
use serenity::prelude::Context;
use std::sync::Arc;
use std::time::Duration;

use super::orchestrator::Orchestrator;
use super::stage::{Criticality, Stage};
use crate::commands::{CommandContext, CommandPublisher, CommandSchema};
use crate::core::status::InitStatus;
use crate::core::store::Store;
use crate::events::EventListener;
use crate::features::audio::AudioAdapter;
use crate::features::presence::{reset_central_embeds, PresenceSink, SerenityPresence};

/// Everything the ready stages touch
pub struct ReadyContext {
    pub adapter: Arc<AudioAdapter>,
    pub publisher: CommandPublisher,
    pub schemas: Vec<CommandSchema>,
    pub store: Arc<dyn Store>,
    pub presence: Arc<dyn PresenceSink>,
    /// The bot user id doubles as the application id
    pub user_id: u64,
    pub guild_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadyReport {
    pub audio_system_ready: bool,
    pub commands_registered: bool,
    pub embed_system_ready: bool,
    pub status_system_ready: bool,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ReadyReport {
    fn from_status(status: &InitStatus, elapsed: Duration) -> Self {
        Self {
            audio_system_ready: status.is_ready(AudioReadyStage.name()),
            commands_registered: status.is_ready(CommandPublishStage.name()),
            embed_system_ready: status.is_ready(EmbedResetStage.name()),
            status_system_ready: status.is_ready(StatusStage.name()),
            elapsed,
        }
    }

    /// Audio and command registration are the systems users notice first
    pub fn is_healthy(&self) -> bool {
        self.audio_system_ready && self.commands_registered
    }
}

pub struct AudioReadyStage;

#[async_trait]
impl Stage<ReadyContext> for AudioReadyStage {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Degrading
    }

    async fn run(&self, ctx: &mut ReadyContext) -> Result<()> {
        ctx.adapter.handshake(ctx.user_id).await?;
        ctx.adapter.bind()?;
        info!("🎵 Audio system initialized successfully");
        Ok(())
    }
}

pub struct CommandPublishStage;

#[async_trait]
impl Stage<ReadyContext> for CommandPublishStage {
    fn name(&self) -> &'static str {
        "commands"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Degrading
    }

    async fn run(&self, ctx: &mut ReadyContext) -> Result<()> {
        // A replace-all of nothing would wipe the commands already registered
        if ctx.schemas.is_empty() {
            bail!("no slash commands were discovered; keeping the registered set untouched");
        }

        let result = ctx.publisher.publish(ctx.user_id, &ctx.schemas).await;
        if result.success {
            Ok(())
        } else {
            Err(anyhow!(result
                .error
                .unwrap_or_else(|| "command registration failed".to_string())))
        }
    }
}

pub struct EmbedResetStage;

#[async_trait]
impl Stage<ReadyContext> for EmbedResetStage {
    fn name(&self) -> &'static str {
        "embeds"
    }

    fn criticality(&self) -> Criticality {
        Criticality::BestEffort
    }

    async fn run(&self, ctx: &mut ReadyContext) -> Result<()> {
        reset_central_embeds(ctx.store.as_ref(), ctx.presence.as_ref()).await?;
        Ok(())
    }
}

pub struct StatusStage;

#[async_trait]
impl Stage<ReadyContext> for StatusStage {
    fn name(&self) -> &'static str {
        "status"
    }

    fn criticality(&self) -> Criticality {
        Criticality::BestEffort
    }

    async fn run(&self, ctx: &mut ReadyContext) -> Result<()> {
        ctx.presence.show_server_count(ctx.guild_count).await
    }
}

pub fn ready_stages() -> Vec<Box<dyn Stage<ReadyContext>>> {
    vec![
        Box::new(AudioReadyStage),
        Box::new(CommandPublishStage),
        Box::new(EmbedResetStage),
        Box::new(StatusStage),
    ]
}

pub async fn run_ready_sequence(ctx: &mut ReadyContext, stage_timeout: Duration) -> ReadyReport {
    let orchestrator = Orchestrator::new("Session ready", ready_stages(), stage_timeout);
    match orchestrator.run(ctx).await {
        Ok(report) => ReadyReport::from_status(&report.status, report.elapsed),
        // unreachable: no ready stage is critical
        Err(e) => ReadyReport::from_status(e.status(), Duration::ZERO),
    }
}

/// Listener bound one-shot to `ready`
pub struct SessionReadyListener {
    adapter: Arc<AudioAdapter>,
    publisher: CommandPublisher,
    schemas: Vec<CommandSchema>,
    store: Arc<dyn Store>,
    command_ctx: Arc<CommandContext>,
    stage_timeout: Duration,
}

impl SessionReadyListener {
    pub fn new(
        publisher: CommandPublisher,
        schemas: Vec<CommandSchema>,
        store: Arc<dyn Store>,
        command_ctx: Arc<CommandContext>,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            adapter: command_ctx.adapter.clone(),
            publisher,
            schemas,
            store,
            command_ctx,
            stage_timeout,
        }
    }
}

#[async_trait]
impl EventListener for SessionReadyListener {
    async fn on_event(&self, ctx: &Context, event: &Event) -> Result<()> {
        let Event::Ready(ready) = event else {
            return Ok(());
        };
        let ready = &ready.ready;

        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("🤖 Bot ID: {}", ready.user.id);
        info!("📡 Connected to {} guilds", ready.guilds.len());

        let mut ready_ctx = ReadyContext {
            adapter: self.adapter.clone(),
            publisher: self.publisher.clone(),
            schemas: self.schemas.clone(),
            store: self.store.clone(),
            presence: Arc::new(SerenityPresence::new(ctx.clone())),
            user_id: ready.user.id.0,
            guild_count: ready.guilds.len(),
        };

        let report = run_ready_sequence(&mut ready_ctx, self.stage_timeout).await;
        if !report.is_healthy() {
            warn!("⚠️ Bot started with some subsystem failures: {report:?}");
        }
        *self.command_ctx.ready_report.write().await = Some(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::publisher::tests::MockRegistry;
    use crate::commands::RegistryScope;
    use crate::core::store::{CentralEmbed, SqliteStore};
    use crate::features::audio::testing::{InitBehavior, MockBackend};
    use crate::features::audio::HandshakeState;
    use crate::features::presence::tests::RecordingPresence;

    struct Fixture {
        ctx: ReadyContext,
        backend: Arc<MockBackend>,
        registry: Arc<MockRegistry>,
        presence: Arc<RecordingPresence>,
    }

    async fn fixture(init: InitBehavior, registry: MockRegistry, presence: RecordingPresence) -> Fixture {
        let backend = Arc::new(MockBackend::new(init));
        let adapter = Arc::new(AudioAdapter::new(backend.clone(), Vec::new()));
        let registry = Arc::new(registry);
        let presence = Arc::new(presence);
        let store = SqliteStore::new(":memory:");
        store.connect().await.unwrap();
        store
            .save_central_embed(&CentralEmbed {
                guild_id: 1,
                channel_id: 2,
                message_id: 3,
            })
            .await
            .unwrap();

        let ctx = ReadyContext {
            adapter,
            publisher: CommandPublisher::new(registry.clone(), RegistryScope::Global),
            schemas: vec![
                CommandSchema::new("ping", "Pong"),
                CommandSchema::new("join", "Join"),
                CommandSchema::new("leave", "Leave"),
            ],
            store: Arc::new(store),
            presence: presence.clone(),
            user_id: 99,
            guild_count: 4,
        };
        Fixture {
            ctx,
            backend,
            registry,
            presence,
        }
    }

    #[tokio::test]
    async fn test_all_systems_ready() {
        let mut f = fixture(
            InitBehavior::Succeed,
            MockRegistry::default(),
            RecordingPresence::default(),
        )
        .await;

        let report = run_ready_sequence(&mut f.ctx, Duration::from_secs(5)).await;

        assert!(report.audio_system_ready);
        assert!(report.commands_registered);
        assert!(report.embed_system_ready);
        assert!(report.status_system_ready);
        assert!(report.is_healthy());
        assert_eq!(f.ctx.adapter.state(), HandshakeState::Bound);
        assert_eq!(f.backend.init_calls(), 1);
        assert_eq!(*f.presence.server_counts.lock().unwrap(), vec![4]);
        assert_eq!(*f.presence.reset.lock().unwrap(), vec![1]);

        let history = f.registry.history.lock().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].1, 99);
        assert_eq!(history[0].2.len(), 3);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_audio_ready() {
        let mut f = fixture(
            InitBehavior::Succeed,
            MockRegistry {
                fail: true,
                ..Default::default()
            },
            RecordingPresence::default(),
        )
        .await;

        let report = run_ready_sequence(&mut f.ctx, Duration::from_secs(5)).await;

        assert!(!report.commands_registered);
        assert!(report.audio_system_ready);
        assert!(report.status_system_ready);
        assert!(!report.is_healthy());
    }

    #[tokio::test]
    async fn test_empty_schemas_never_reach_registry() {
        let mut f = fixture(
            InitBehavior::Succeed,
            MockRegistry::default(),
            RecordingPresence::default(),
        )
        .await;
        f.ctx.schemas.clear();

        let report = run_ready_sequence(&mut f.ctx, Duration::from_secs(5)).await;

        assert!(!report.commands_registered);
        assert!(report.audio_system_ready);
        assert!(f.registry.history.lock().unwrap().is_empty());
        assert!(f.registry.state.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handshake_failure_leaves_adapter_unbound() {
        let mut f = fixture(
            InitBehavior::Fail("node auth rejected"),
            MockRegistry::default(),
            RecordingPresence::default(),
        )
        .await;

        let report = run_ready_sequence(&mut f.ctx, Duration::from_secs(5)).await;

        assert!(!report.audio_system_ready);
        assert!(report.commands_registered);
        assert_eq!(f.ctx.adapter.state(), HandshakeState::Unbound);
    }

    #[tokio::test]
    async fn test_timed_out_handshake_leaves_adapter_unbound() {
        let mut f = fixture(
            InitBehavior::Hang,
            MockRegistry::default(),
            RecordingPresence::default(),
        )
        .await;

        let report = run_ready_sequence(&mut f.ctx, Duration::from_millis(50)).await;

        assert!(!report.audio_system_ready);
        assert!(report.commands_registered);
        assert_eq!(f.ctx.adapter.state(), HandshakeState::Unbound);
    }

    #[tokio::test]
    async fn test_already_initialised_backend_counts_as_ready() {
        let mut f = fixture(
            InitBehavior::AlreadyInitialized,
            MockRegistry::default(),
            RecordingPresence::default(),
        )
        .await;

        let report = run_ready_sequence(&mut f.ctx, Duration::from_secs(5)).await;

        assert!(report.audio_system_ready);
        assert!(f.ctx.adapter.is_ready());
    }

    #[tokio::test]
    async fn test_best_effort_failures_do_not_affect_health() {
        let mut f = fixture(
            InitBehavior::Succeed,
            MockRegistry::default(),
            RecordingPresence {
                fail_status: true,
                ..Default::default()
            },
        )
        .await;

        let report = run_ready_sequence(&mut f.ctx, Duration::from_secs(5)).await;

        assert!(!report.status_system_ready);
        assert!(report.embed_system_ready);
        assert!(report.is_healthy());
    }
}
