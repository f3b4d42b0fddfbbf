//! # Command Registry Publisher
//!
//! Publishes the structured command catalog with one bulk replace-all call.
//! The call is idempotent; failures are reported, never raised.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info};
use serde_json::Value;
use serenity::http::Http;
use std::sync::Arc;

use super::schema::CommandSchema;

/// Which remote collection receives the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryScope {
    /// Application-wide; may take a while to propagate
    Global,
    /// Single guild; updates instantly, used for development
    Guild(u64),
}

impl RegistryScope {
    pub fn from_guild(guild_id: Option<u64>) -> Self {
        guild_id.map_or(RegistryScope::Global, RegistryScope::Guild)
    }
}

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Replace the whole remote collection with `commands`
    async fn replace_all(
        &self,
        scope: RegistryScope,
        application_id: u64,
        commands: &[CommandSchema],
    ) -> Result<()>;
}

/// Bulk overwrite body: the schemas as one JSON array, in catalog order
pub fn registry_payload(commands: &[CommandSchema]) -> Result<Value> {
    Ok(serde_json::to_value(commands)?)
}

/// Bulk overwrite through serenity's HTTP client and its rate limiter
pub struct SerenityCommandRegistry {
    http: Arc<Http>,
}

impl SerenityCommandRegistry {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RegistryClient for SerenityCommandRegistry {
    async fn replace_all(
        &self,
        scope: RegistryScope,
        application_id: u64,
        commands: &[CommandSchema],
    ) -> Result<()> {
        let payload = registry_payload(commands)?;
        self.http.set_application_id(application_id);

        match scope {
            RegistryScope::Global => {
                self.http.create_global_application_commands(&payload).await?;
            }
            RegistryScope::Guild(guild_id) => {
                self.http
                    .create_guild_application_commands(guild_id, &payload)
                    .await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    pub success: bool,
    pub command_count: usize,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct CommandPublisher {
    registry: Arc<dyn RegistryClient>,
    scope: RegistryScope,
}

impl CommandPublisher {
    pub fn new(registry: Arc<dyn RegistryClient>, scope: RegistryScope) -> Self {
        Self { registry, scope }
    }

    pub fn scope(&self) -> RegistryScope {
        self.scope
    }

    pub async fn publish(&self, application_id: u64, commands: &[CommandSchema]) -> RegistrationResult {
        info!(
            "🔄 Started refreshing {} slash commands ({:?})...",
            commands.len(),
            self.scope
        );

        match self
            .registry
            .replace_all(self.scope, application_id, commands)
            .await
        {
            Ok(()) => {
                info!("✅ Successfully registered {} slash commands!", commands.len());
                RegistrationResult {
                    success: true,
                    command_count: commands.len(),
                    error: None,
                }
            }
            Err(e) => {
                error!("❌ Command registration failed: {e:#}");
                RegistrationResult {
                    success: false,
                    command_count: 0,
                    error: Some(format!("{e:#}")),
                }
            }
        }
    }
}
