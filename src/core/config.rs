//! # Configuration
//!
//! Loads bot configuration from an optional YAML file, with environment
//! variables taking precedence over file values.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use crate::features::audio::NodeDescriptor;
use anyhow::{anyhow, Context as _, Result};
use serde::Deserialize;
use serde_yaml::Value;
use std::time::Duration;

/// Default location of the YAML config file (overridable via `BOT_CONFIG_PATH`)
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

pub const DEFAULT_LAVALINK_PORT: u16 = 2333;

/// Explicit node name; the audio client keys its node table by this value
pub const PRIMARY_NODE_NAME: &str = "Primary-Node";

const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MEMORY_WARN_MB: u64 = 512;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    discord: DiscordSection,
    lavalink: LavalinkSection,
    database: DatabaseSection,
    bot: BotSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiscordSection {
    token: Option<String>,
    guild_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LavalinkSection {
    host: Option<String>,
    port: Option<Value>,
    password: Option<String>,
    secure: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BotSection {
    prefix: Option<String>,
    log_level: Option<String>,
    stage_timeout_secs: Option<u64>,
    memory_warn_mb: Option<u64>,
}

/// Connection settings for the audio node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LavalinkConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub secure: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// Development guild; when set, commands are published guild-scoped
    pub discord_guild_id: Option<u64>,
    pub lavalink: LavalinkConfig,
    pub database_path: String,
    pub command_prefix: String,
    pub log_level: String,
    /// Upper bound for each bootstrap stage
    pub stage_timeout: Duration,
    pub memory_warn_mb: u64,
}

impl Config {
    /// Load from `BOT_CONFIG_PATH` (or `config.yaml`) plus the process environment.
    ///
    /// A missing config file is not an error; everything can come from env vars.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("BOT_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).with_context(|| format!("Failed to read config file {path}")),
        };

        Self::from_sources(contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build a config from YAML text and an environment lookup
    pub fn from_sources<F>(yaml: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = match yaml {
            Some(text) if !text.trim().is_empty() => {
                serde_yaml::from_str(text).context("Failed to parse config YAML")?
            }
            _ => FileConfig::default(),
        };

        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // Configured token first, then the bare TOKEN fallback
        let discord_token = env("DISCORD_TOKEN")
            .or_else(|| file.discord.token.clone().filter(|t| !t.trim().is_empty()))
            .or_else(|| env("TOKEN"))
            .ok_or_else(|| anyhow!("No Discord token configured (set discord.token, DISCORD_TOKEN or TOKEN)"))?;

        let discord_guild_id = env("DISCORD_GUILD_ID")
            .or_else(|| file.discord.guild_id.as_ref().and_then(scalar))
            .and_then(|id| id.trim().parse::<u64>().ok());

        let port_raw = env("LAVALINK_PORT").or_else(|| file.lavalink.port.as_ref().and_then(scalar));
        let secure_raw =
            env("LAVALINK_SECURE").or_else(|| file.lavalink.secure.as_ref().and_then(scalar));

        let lavalink = LavalinkConfig {
            host: env("LAVALINK_HOST")
                .or(file.lavalink.host)
                .unwrap_or_else(|| "localhost".to_string()),
            port: parse_port(port_raw.as_deref()),
            password: env("LAVALINK_PASSWORD")
                .or(file.lavalink.password)
                .unwrap_or_else(|| "youshallnotpass".to_string()),
            secure: parse_secure(secure_raw.as_deref()),
        };

        let stage_timeout_secs = env("STAGE_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .or(file.bot.stage_timeout_secs)
            .unwrap_or(DEFAULT_STAGE_TIMEOUT_SECS);

        Ok(Config {
            discord_token,
            discord_guild_id,
            lavalink,
            database_path: env("DATABASE_PATH")
                .or(file.database.path)
                .unwrap_or_else(|| "data/bot.db".to_string()),
            command_prefix: env("COMMAND_PREFIX")
                .or(file.bot.prefix)
                .unwrap_or_else(|| "!".to_string()),
            log_level: env("LOG_LEVEL")
                .or(file.bot.log_level)
                .unwrap_or_else(|| "info".to_string()),
            stage_timeout: Duration::from_secs(stage_timeout_secs.max(1)),
            memory_warn_mb: env("MEMORY_WARN_MB")
                .and_then(|v| v.parse().ok())
                .or(file.bot.memory_warn_mb)
                .unwrap_or(DEFAULT_MEMORY_WARN_MB),
        })
    }

    /// Audio node descriptors derived from the lavalink section
    pub fn audio_nodes(&self) -> Vec<NodeDescriptor> {
        vec![NodeDescriptor {
            name: PRIMARY_NODE_NAME.to_string(),
            host: self.lavalink.host.clone(),
            port: self.lavalink.port,
            password: self.lavalink.password.clone(),
            secure: self.lavalink.secure,
        }]
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_port(raw: Option<&str>) -> u16 {
    raw.and_then(|p| p.trim().parse::<u16>().ok())
        .filter(|p| *p != 0)
        .unwrap_or(DEFAULT_LAVALINK_PORT)
}

fn parse_secure(raw: Option<&str>) -> bool {
    matches!(raw.map(|s| s.trim().to_ascii_lowercase()).as_deref(), Some("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_token_from_file() {
        let yaml = "discord:\n  token: file-token\n";
        let config = Config::from_sources(Some(yaml), lookup(&[("TOKEN", "env-token")])).unwrap();
        assert_eq!(config.discord_token, "file-token");
    }

    #[test]
    fn test_token_falls_back_to_env() {
        let config = Config::from_sources(None, lookup(&[("TOKEN", "env-token")])).unwrap();
        assert_eq!(config.discord_token, "env-token");
    }

    #[test]
    fn test_blank_file_token_uses_fallback() {
        let yaml = "discord:\n  token: \"  \"\n";
        let config = Config::from_sources(Some(yaml), lookup(&[("TOKEN", "env-token")])).unwrap();
        assert_eq!(config.discord_token, "env-token");
    }

    #[test]
    fn test_missing_token_is_error() {
        let result = Config::from_sources(None, lookup(&[]));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No Discord token"));
    }

    #[test]
    fn test_lavalink_port_and_secure_parsing() {
        let yaml = "lavalink:\n  host: audio.local\n  port: \"2444\"\n  secure: \"true\"\n";
        let config = Config::from_sources(Some(yaml), lookup(&[("TOKEN", "t")])).unwrap();
        assert_eq!(config.lavalink.host, "audio.local");
        assert_eq!(config.lavalink.port, 2444);
        assert!(config.lavalink.secure);

        let yaml = "lavalink:\n  port: not-a-port\n  secure: false\n";
        let config = Config::from_sources(Some(yaml), lookup(&[("TOKEN", "t")])).unwrap();
        assert_eq!(config.lavalink.port, DEFAULT_LAVALINK_PORT);
        assert!(!config.lavalink.secure);
    }

    #[test]
    fn test_env_overrides_file() {
        let yaml = "lavalink:\n  host: from-file\nbot:\n  prefix: \"?\"\n";
        let config = Config::from_sources(
            Some(yaml),
            lookup(&[
                ("TOKEN", "t"),
                ("LAVALINK_HOST", "from-env"),
                ("DISCORD_GUILD_ID", "123456789"),
            ]),
        )
        .unwrap();
        assert_eq!(config.lavalink.host, "from-env");
        assert_eq!(config.command_prefix, "?");
        assert_eq!(config.discord_guild_id, Some(123456789));
    }

    #[test]
    fn test_audio_nodes_use_primary_name() {
        let config = Config::from_sources(None, lookup(&[("TOKEN", "t")])).unwrap();
        let nodes = config.audio_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, PRIMARY_NODE_NAME);
        assert_eq!(nodes[0].port, DEFAULT_LAVALINK_PORT);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(None, lookup(&[("TOKEN", "t")])).unwrap();
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.stage_timeout, Duration::from_secs(30));
        assert_eq!(config.memory_warn_mb, 512);
        assert!(config.discord_guild_id.is_none());
    }
}
