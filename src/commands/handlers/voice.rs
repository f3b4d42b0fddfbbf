//! Voice command handlers
//!
//! Handles: join, leave
//!
//! `join` takes an optional channel (slash option, or a mention/id after
//! the text trigger) and otherwise uses the caller's current voice channel.
//!
//! Both commands go through the audio adapter, so they answer with a
//! "still starting up" notice until the session-ready sequence has bound it.
//!
//! - **Version**: 1.0.0
//! - **Since**: 2.0.0

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandDataOptionValue,
};
use serenity::model::channel::Message;
use serenity::model::id::{GuildId, UserId};
use serenity::prelude::Context;
use std::sync::Arc;

use super::respond;
use crate::commands::context::CommandContext;
use crate::commands::handler::{SlashCommandHandler, TextCommandHandler};
use crate::commands::schema::{CommandOptionSchema, CommandSchema, VOICE_CHANNEL_TYPES};
use crate::features::audio::{AudioError, PlayerRequest};

/// Handler for /join and `!join`
pub struct JoinCommand;

#[async_trait]
impl SlashCommandHandler for JoinCommand {
    fn name(&self) -> &str {
        "join"
    }

    fn schema(&self) -> Option<CommandSchema> {
        Some(
            CommandSchema::new("join", "Join a voice channel").option(CommandOptionSchema::channel(
                "channel",
                "Voice channel to join (defaults to yours)",
                VOICE_CHANNEL_TYPES,
            )),
        )
    }

    async fn handle(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let voice_channel = channel_option(command).or_else(|| {
            command
                .guild_id
                .and_then(|g| user_voice_channel(serenity_ctx, g, command.user.id))
        });
        let reply = join_voice(
            &ctx,
            command.guild_id.map(|g| g.0),
            voice_channel,
            command.channel_id.0,
        )
        .await;
        respond(serenity_ctx, command, &reply).await
    }
}

#[async_trait]
impl TextCommandHandler for JoinCommand {
    fn trigger(&self) -> &str {
        "join"
    }

    async fn execute(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        msg: &Message,
        args: &[&str],
    ) -> Result<()> {
        let voice_channel = args.first().and_then(|a| parse_channel_arg(a)).or_else(|| {
            msg.guild_id
                .and_then(|g| user_voice_channel(serenity_ctx, g, msg.author.id))
        });
        let reply = join_voice(&ctx, msg.guild_id.map(|g| g.0), voice_channel, msg.channel_id.0).await;
        msg.channel_id.say(&serenity_ctx.http, reply).await?;
        Ok(())
    }
}

/// Handler for /leave and `!leave`
pub struct LeaveCommand;

#[async_trait]
impl SlashCommandHandler for LeaveCommand {
    fn name(&self) -> &str {
        "leave"
    }

    fn schema(&self) -> Option<CommandSchema> {
        Some(CommandSchema::new("leave", "Disconnect from voice"))
    }

    async fn handle(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let reply = leave_voice(&ctx, command.guild_id.map(|g| g.0)).await;
        respond(serenity_ctx, command, &reply).await
    }
}

#[async_trait]
impl TextCommandHandler for LeaveCommand {
    fn trigger(&self) -> &str {
        "leave"
    }

    async fn execute(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        msg: &Message,
        _args: &[&str],
    ) -> Result<()> {
        let reply = leave_voice(&ctx, msg.guild_id.map(|g| g.0)).await;
        msg.channel_id.say(&serenity_ctx.http, reply).await?;
        Ok(())
    }
}

fn channel_option(command: &ApplicationCommandInteraction) -> Option<u64> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == "channel")
        .and_then(|o| match &o.resolved {
            Some(CommandDataOptionValue::Channel(channel)) => Some(channel.id.0),
            _ => None,
        })
}

/// Accepts a channel mention (`<#123>`) or a bare id
fn parse_channel_arg(arg: &str) -> Option<u64> {
    arg.strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(arg)
        .parse()
        .ok()
}

fn user_voice_channel(serenity_ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<u64> {
    serenity_ctx
        .cache
        .guild(guild_id)?
        .voice_states
        .get(&user_id)?
        .channel_id
        .map(|c| c.0)
}

pub(crate) async fn join_voice(
    ctx: &CommandContext,
    guild_id: Option<u64>,
    voice_channel: Option<u64>,
    text_channel: u64,
) -> String {
    let Some(guild_id) = guild_id else {
        return "❌ This command only works in a server.".to_string();
    };
    let Some(voice_channel_id) = voice_channel else {
        return "❌ Join a voice channel first.".to_string();
    };

    let request = PlayerRequest {
        guild_id,
        voice_channel_id,
        text_channel_id: text_channel,
        deaf: true,
    };

    match ctx.adapter.create_player(request).await {
        Ok(player) => {
            info!(
                "Joined voice channel {} in guild {guild_id} via node {}",
                player.voice_channel_id, player.node
            );
            format!("🎵 Joined <#{}>", player.voice_channel_id)
        }
        Err(e) => {
            warn!("Join failed in guild {guild_id}: {e}");
            describe_audio_error(&e)
        }
    }
}

pub(crate) async fn leave_voice(ctx: &CommandContext, guild_id: Option<u64>) -> String {
    let Some(guild_id) = guild_id else {
        return "❌ This command only works in a server.".to_string();
    };

    match ctx.adapter.destroy_player(guild_id).await {
        Ok(()) => "👋 Left the voice channel.".to_string(),
        Err(e) => {
            warn!("Leave failed in guild {guild_id}: {e}");
            describe_audio_error(&e)
        }
    }
}

pub(crate) fn describe_audio_error(err: &AudioError) -> String {
    match err {
        AudioError::NotReady { .. } => {
            "⏳ The audio engine is still starting up, try again in a moment.".to_string()
        }
        AudioError::HandshakeFailed(_) => "❌ The audio engine failed to start.".to_string(),
        AudioError::Backend(message) => format!("❌ Audio error: {message}"),
    }
}
