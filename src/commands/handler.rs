//! Command handler traits
//!
//! - **Version**: 2.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 2.0.0: Split into structured and text-trigger handlers; schema lives on the handler
//! - 1.0.0: Initial implementation for modular command handling

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::channel::Message;
use serenity::prelude::Context;
use std::sync::Arc;

use super::context::CommandContext;
use super::schema::CommandSchema;

/// Trait for structured (slash) command handlers
///
/// Each handler declares the name it is dispatched under and the schema that
/// gets published to the remote command registry.
///
/// # Example
///
/// ```ignore
/// pub struct PingCommand;
///
/// #[async_trait]
/// impl SlashCommandHandler for PingCommand {
///     fn name(&self) -> &str {
///         "ping"
///     }
///
///     fn schema(&self) -> Option<CommandSchema> {
///         Some(CommandSchema::new("ping", "Check that the bot is alive"))
///     }
///
///     async fn handle(
///         &self,
///         ctx: Arc<CommandContext>,
///         serenity_ctx: &Context,
///         command: &ApplicationCommandInteraction,
///     ) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait SlashCommandHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Schema for remote registration; `None` marks the entry as malformed
    fn schema(&self) -> Option<CommandSchema>;

    async fn handle(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()>;
}

/// Trait for prefix-triggered text commands
#[async_trait]
pub trait TextCommandHandler: Send + Sync {
    fn trigger(&self) -> &str;

    /// `args` are the whitespace-separated words after the trigger
    async fn execute(
        &self,
        ctx: Arc<CommandContext>,
        serenity_ctx: &Context,
        msg: &Message,
        args: &[&str],
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both traits must stay object-safe (stored as Arc<dyn ...>)
    fn _assert_slash_object_safe(_: &dyn SlashCommandHandler) {}
    fn _assert_text_object_safe(_: &dyn TextCommandHandler) {}
}
