//! # Presence Feature
//!
//! Status display ("listening to N servers") and the reset of each guild's
//! central player embed back to its idle state after a restart.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: true

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serenity::model::gateway::Activity;
use serenity::model::id::{ChannelId, MessageId};
use serenity::prelude::Context;

use crate::core::store::{CentralEmbed, Store};

const IDLE_EMBED_COLOR: u32 = 0x5865F2;

/// Where presence updates go; the live implementation talks to the gateway
#[async_trait]
pub trait PresenceSink: Send + Sync {
    /// Put one stored central embed back into its idle state
    async fn reset_embed(&self, embed: &CentralEmbed) -> Result<()>;

    async fn show_server_count(&self, count: usize) -> Result<()>;
}

pub fn server_count_activity(count: usize) -> String {
    match count {
        1 => "1 server".to_string(),
        n => format!("{n} servers"),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedResetSummary {
    pub reset: usize,
    pub failed: usize,
}

/// Reset every stored central embed. Individual failures (deleted message,
/// missing permissions) are logged and counted; only a store error fails.
pub async fn reset_central_embeds(
    store: &dyn Store,
    sink: &dyn PresenceSink,
) -> Result<EmbedResetSummary> {
    let embeds = store.central_embeds().await?;
    let mut summary = EmbedResetSummary::default();

    for embed in &embeds {
        match sink.reset_embed(embed).await {
            Ok(()) => summary.reset += 1,
            Err(e) => {
                warn!(
                    "Failed to reset central embed in guild {}: {e:#}",
                    embed.guild_id
                );
                summary.failed += 1;
            }
        }
    }

    info!(
        "🎛️ Reset {} central embeds ({} failed)",
        summary.reset, summary.failed
    );
    Ok(summary)
}

pub struct SerenityPresence {
    ctx: Context,
}

impl SerenityPresence {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PresenceSink for SerenityPresence {
    async fn reset_embed(&self, embed: &CentralEmbed) -> Result<()> {
        ChannelId(embed.channel_id)
            .edit_message(&self.ctx.http, MessageId(embed.message_id), |m| {
                m.content("").embed(|e| {
                    e.title("🎵 Nothing playing")
                        .description("Use `/join` and queue something up.")
                        .color(IDLE_EMBED_COLOR)
                })
            })
            .await?;
        Ok(())
    }

    async fn show_server_count(&self, count: usize) -> Result<()> {
        let label = server_count_activity(count);
        self.ctx.set_activity(Activity::listening(&label)).await;
        info!("📊 Status set: listening to {label}");
        Ok(())
    }
}
