//! # Command System
//!
//! Text (prefix) and slash command tables, their handlers, and the
//! publisher that pushes slash schemas to the remote registry.
//!
//! - **Version**: 3.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 3.0.0: Two-table catalog with bulk registry publishing; prefix commands return
//! - 2.1.0: Add modular handler infrastructure (handler trait, context, registry)
//! - 1.0.0: Initial reorganization with modular command structure

pub mod catalog;
pub mod context;
pub mod handler;
pub mod handlers;
pub mod publisher;
pub mod schema;

pub use catalog::{CommandCatalog, CommandEntry, LoadReport, SkipReason, SkippedCommand};
pub use context::CommandContext;
pub use handler::{SlashCommandHandler, TextCommandHandler};
pub use publisher::{
    CommandPublisher, RegistrationResult, RegistryClient, RegistryScope, SerenityCommandRegistry,
};
pub use schema::{CommandOptionSchema, CommandSchema, OptionKind, VOICE_CHANNEL_TYPES};
