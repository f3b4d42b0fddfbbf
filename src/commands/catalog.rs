//! Command catalog
//!
//! Loads command descriptors into two lookup tables: text triggers and
//! structured (slash) commands. Malformed descriptors are skipped with a
//! warning; loading never fails.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::handler::{SlashCommandHandler, TextCommandHandler};
use super::schema::CommandSchema;

/// Longest name the platform accepts for a structured command
pub const MAX_NAME_LEN: usize = 32;

/// One discovered command definition
pub enum CommandEntry {
    Text(Arc<dyn TextCommandHandler>),
    Slash(Arc<dyn SlashCommandHandler>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTable {
    Text,
    Slash,
}

impl fmt::Display for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandTable::Text => write!(f, "text"),
            CommandTable::Slash => write!(f, "slash"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InvalidName,
    Duplicate,
    MissingSchema,
    SchemaNameMismatch { schema_name: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidName => write!(
                f,
                "name must be 1-{MAX_NAME_LEN} lowercase letters, digits, '-' or '_'"
            ),
            SkipReason::Duplicate => write!(f, "name already registered"),
            SkipReason::MissingSchema => write!(f, "no schema for remote registration"),
            SkipReason::SchemaNameMismatch { schema_name } => {
                write!(f, "schema is named '{schema_name}'")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCommand {
    pub table: CommandTable,
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedCommand>,
}

/// Immutable command tables built once at startup
#[derive(Clone, Default)]
pub struct CommandCatalog {
    text: HashMap<String, Arc<dyn TextCommandHandler>>,
    slash: HashMap<String, Arc<dyn SlashCommandHandler>>,
    /// Structured schemas in discovery order
    schemas: Vec<CommandSchema>,
}

impl CommandCatalog {
    pub fn load(entries: impl IntoIterator<Item = CommandEntry>) -> (Self, LoadReport) {
        let mut catalog = CommandCatalog::default();
        let mut report = LoadReport::default();

        for entry in entries {
            let outcome = match entry {
                CommandEntry::Text(handler) => catalog.insert_text(handler),
                CommandEntry::Slash(handler) => catalog.insert_slash(handler),
            };

            match outcome {
                Ok(()) => report.loaded += 1,
                Err(skipped) => {
                    warn!(
                        "⚠️ Skipping {} command '{}': {}",
                        skipped.table, skipped.name, skipped.reason
                    );
                    report.skipped.push(skipped);
                }
            }
        }

        info!(
            "📚 Loaded {} text commands and {} slash commands ({} skipped)",
            catalog.text.len(),
            catalog.slash.len(),
            report.skipped.len()
        );

        (catalog, report)
    }

    fn insert_text(&mut self, handler: Arc<dyn TextCommandHandler>) -> Result<(), SkippedCommand> {
        let name = handler.trigger().to_string();
        let skip = |reason| SkippedCommand {
            table: CommandTable::Text,
            name: name.clone(),
            reason,
        };

        if !is_valid_name(&name) {
            return Err(skip(SkipReason::InvalidName));
        }
        if self.text.contains_key(&name) {
            return Err(skip(SkipReason::Duplicate));
        }

        self.text.insert(name, handler);
        Ok(())
    }

    fn insert_slash(&mut self, handler: Arc<dyn SlashCommandHandler>) -> Result<(), SkippedCommand> {
        let name = handler.name().to_string();
        let skip = |reason| SkippedCommand {
            table: CommandTable::Slash,
            name: name.clone(),
            reason,
        };

        if !is_valid_name(&name) {
            return Err(skip(SkipReason::InvalidName));
        }
        if self.slash.contains_key(&name) {
            return Err(skip(SkipReason::Duplicate));
        }
        let schema = handler.schema().ok_or_else(|| skip(SkipReason::MissingSchema))?;
        if schema.name != name {
            return Err(skip(SkipReason::SchemaNameMismatch {
                schema_name: schema.name,
            }));
        }

        self.schemas.push(schema);
        self.slash.insert(name, handler);
        Ok(())
    }

    /// Look up a text trigger (case-insensitive)
    pub fn text_command(&self, trigger: &str) -> Option<Arc<dyn TextCommandHandler>> {
        self.text.get(&trigger.to_lowercase()).cloned()
    }

    pub fn slash_command(&self, name: &str) -> Option<Arc<dyn SlashCommandHandler>> {
        self.slash.get(name).cloned()
    }

    pub fn slash_schemas(&self) -> &[CommandSchema] {
        &self.schemas
    }

    pub fn text_len(&self) -> usize {
        self.text.len()
    }

    pub fn slash_len(&self) -> usize {
        self.slash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.slash.is_empty()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
