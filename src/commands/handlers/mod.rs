//! Per-command handler implementations
//!
//! - **Version**: 3.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 3.0.0: Replace directory scanning with an explicit manifest of text and slash entries
//! - 2.0.0: Add voice commands (join, leave)
//! - 1.0.0: Initial extraction of utility commands

pub mod utility;
pub mod voice;

use anyhow::Result;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::Context;
use std::sync::Arc;

use super::catalog::CommandEntry;

/// Every command the bot ships, in discovery order
///
/// Each command is listed once per table it lives in.
pub fn manifest() -> Vec<CommandEntry> {
    let ping = Arc::new(utility::PingCommand);
    let nodes = Arc::new(utility::NodesCommand);
    let join = Arc::new(voice::JoinCommand);
    let leave = Arc::new(voice::LeaveCommand);

    vec![
        CommandEntry::Slash(ping.clone()),
        CommandEntry::Slash(join.clone()),
        CommandEntry::Slash(leave.clone()),
        CommandEntry::Slash(nodes.clone()),
        CommandEntry::Text(ping),
        CommandEntry::Text(join),
        CommandEntry::Text(leave),
        CommandEntry::Text(nodes),
    ]
}

/// Send a plain channel-message response to a slash command
pub(crate) async fn respond(
    serenity_ctx: &Context,
    command: &ApplicationCommandInteraction,
    content: &str,
) -> Result<()> {
    command
        .create_interaction_response(&serenity_ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(content))
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::catalog::CommandCatalog;

    #[test]
    fn test_manifest_loads_cleanly() {
        let (catalog, report) = CommandCatalog::load(manifest());

        assert!(report.skipped.is_empty());
        assert_eq!(catalog.slash_len(), 4);
        assert_eq!(catalog.text_len(), 4);

        let names: Vec<_> = catalog
            .slash_schemas()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["ping", "join", "leave", "nodes"]);
    }
}
