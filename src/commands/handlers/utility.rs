//! Utility command handlers
//!
//! Handles: ping, nodes
//!
//! - **Version**: 2.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 2.0.0: Add audio node listing; each command is its own handler
//! - 1.0.0: Extracted from the monolithic command handler

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::channel::Message;
use serenity::prelude::Context;
use std::sync::Arc;

use super::respond;
use crate::commands::context::CommandContext;
use crate::commands::handler::{SlashCommandHandler, TextCommandHandler};
use crate::commands::schema::CommandSchema;
use crate::features::audio::NodeStatus;

/// Handler for /ping and `!ping`
pub struct PingCommand;

impl PingCommand {
    fn reply(ctx: &CommandContext) -> String {
        format!("🏓 Pong! Uptime: {}", format_uptime(ctx.uptime_secs()))
    }
}

#[async_trait]
impl SlashCommandHandler for PingCommand {
    fn name(&self) -> &str {
        "ping"
    }

    fn schema(&self) -> Option<CommandSchema> {
        Some(CommandSchema::new("ping", "Check that the bot is alive"))
    }

    async fn handle(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        respond(serenity_ctx, command, &Self::reply(&ctx)).await?;
        info!("Ping command completed for user {}", command.user.id);
        Ok(())
    }
}

#[async_trait]
impl TextCommandHandler for PingCommand {
    fn trigger(&self) -> &str {
        "ping"
    }

    async fn execute(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        msg: &Message,
        _args: &[&str],
    ) -> Result<()> {
        msg.channel_id
            .say(&serenity_ctx.http, Self::reply(&ctx))
            .await?;
        Ok(())
    }
}

/// Handler for /nodes and `!nodes`: audio node connection summary
pub struct NodesCommand;

impl NodesCommand {
    fn reply(ctx: &CommandContext) -> String {
        format_nodes(&ctx.adapter.nodes(), ctx.adapter.is_ready())
    }
}

#[async_trait]
impl SlashCommandHandler for NodesCommand {
    fn name(&self) -> &str {
        "nodes"
    }

    fn schema(&self) -> Option<CommandSchema> {
        Some(CommandSchema::new("nodes", "Show audio node status"))
    }

    async fn handle(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        respond(serenity_ctx, command, &Self::reply(&ctx)).await
    }
}

#[async_trait]
impl TextCommandHandler for NodesCommand {
    fn trigger(&self) -> &str {
        "nodes"
    }

    async fn execute(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        msg: &Message,
        _args: &[&str],
    ) -> Result<()> {
        msg.channel_id
            .say(&serenity_ctx.http, Self::reply(&ctx))
            .await?;
        Ok(())
    }
}

fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub(crate) fn format_nodes(nodes: &[NodeStatus], engine_ready: bool) -> String {
    let mut out = String::from("**Audio nodes**\n");
    if nodes.is_empty() {
        out.push_str("No nodes configured\n");
    }
    for node in nodes {
        let icon = if node.connected { "🟢" } else { "🔴" };
        let label = if node.connected { "connected" } else { "disconnected" };
        out.push_str(&format!("{icon} `{}` {label}\n", node.name));
    }
    out.push_str(if engine_ready {
        "Engine: ready"
    } else {
        "Engine: starting up"
    });
    out
}
