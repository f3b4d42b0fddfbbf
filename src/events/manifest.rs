//! Event manifest
//!
//! The fixed list of event bindings made during startup. `ready` is the one
//! canonical session-established signal and is bound exactly once.

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info};
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::event::Event;
use serenity::prelude::Context;
use std::sync::Arc;

use super::router::{EventBinding, EventListener};
use crate::commands::{CommandCatalog, CommandContext};

/// Build the bindings in the order they should attach
pub fn manifest(
    catalog: Arc<CommandCatalog>,
    command_ctx: Arc<CommandContext>,
    session_ready: Arc<dyn EventListener>,
) -> Vec<EventBinding> {
    vec![
        EventBinding::once("ready", session_ready),
        EventBinding::on(
            "interaction_create",
            Arc::new(SlashDispatch {
                catalog: catalog.clone(),
                command_ctx: command_ctx.clone(),
            }),
        ),
        EventBinding::on(
            "message_create",
            Arc::new(TextDispatch {
                catalog,
                command_ctx,
            }),
        ),
    ]
}

/// Routes application command interactions to the slash table
pub struct SlashDispatch {
    catalog: Arc<CommandCatalog>,
    command_ctx: Arc<CommandContext>,
}

#[async_trait]
impl EventListener for SlashDispatch {
    async fn on_event(&self, ctx: &Context, event: &Event) -> Result<()> {
        let Event::InteractionCreate(create) = event else {
            return Ok(());
        };
        let Interaction::ApplicationCommand(command) = &create.interaction else {
            return Ok(());
        };

        let Some(handler) = self.catalog.slash_command(&command.data.name) else {
            info!("Unknown slash command: {}", command.data.name);
            return Ok(());
        };

        if let Err(e) = handler.handle(self.command_ctx.clone(), ctx, command).await {
            error!(
                "Error handling slash command '{}': {e:#}",
                command.data.name
            );
            let _ = command
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::ChannelMessageWithSource)
                        .interaction_response_data(|message| {
                            message.content(
                                "❌ Sorry, I encountered an error processing your command. Please try again.",
                            )
                        })
                })
                .await;
        }
        Ok(())
    }
}

/// Routes prefixed chat messages to the text table
pub struct TextDispatch {
    catalog: Arc<CommandCatalog>,
    command_ctx: Arc<CommandContext>,
}

#[async_trait]
impl EventListener for TextDispatch {
    async fn on_event(&self, ctx: &Context, event: &Event) -> Result<()> {
        let Event::MessageCreate(create) = event else {
            return Ok(());
        };
        let msg = &create.message;
        if msg.author.bot {
            return Ok(());
        }

        let Some((trigger, args)) = parse_invocation(&msg.content, &self.command_ctx.prefix) else {
            return Ok(());
        };
        let Some(handler) = self.catalog.text_command(trigger) else {
            return Ok(());
        };

        if let Err(e) = handler
            .execute(self.command_ctx.clone(), ctx, msg, &args)
            .await
        {
            error!("Error handling text command '{trigger}': {e:#}");
            if let Err(why) = msg
                .channel_id
                .say(&ctx.http, "Sorry, I encountered an error processing your message.")
                .await
            {
                error!("Failed to send error message: {why}");
            }
        }
        Ok(())
    }
}

/// Split `!play some song` into `("play", ["some", "song"])`
pub fn parse_invocation<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, Vec<&'a str>)> {
    if prefix.is_empty() {
        return None;
    }
    let rest = content.trim_start().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let trigger = words.next()?;
    // "! ping" is not an invocation
    if rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((trigger, words.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invocation() {
        assert_eq!(parse_invocation("!ping", "!"), Some(("ping", vec![])));
        assert_eq!(
            parse_invocation("  !join now please", "!"),
            Some(("join", vec!["now", "please"]))
        );
        assert_eq!(parse_invocation("?ping", "?"), Some(("ping", vec![])));
        assert_eq!(parse_invocation("ping", "!"), None);
        assert_eq!(parse_invocation("! ping", "!"), None);
        assert_eq!(parse_invocation("!", "!"), None);
        assert_eq!(parse_invocation("!ping", ""), None);
    }
}
