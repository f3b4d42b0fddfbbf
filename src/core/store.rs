//! # Persistent Store
//!
//! SQLite-backed storage. Startup only needs `connect()`; the central embed
//! table is read once on session ready to reset player panels.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use log::{debug, info};
use sqlite::{ConnectionThreadSafe, State};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS central_embeds (
    guild_id INTEGER PRIMARY KEY,
    channel_id INTEGER NOT NULL,
    message_id INTEGER NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
";

/// Pinned "now playing" panel message for a guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralEmbed {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Open the connection and ensure the schema exists
    async fn connect(&self) -> Result<()>;

    async fn central_embeds(&self) -> Result<Vec<CentralEmbed>>;

    async fn save_central_embed(&self, embed: &CentralEmbed) -> Result<()>;
}

pub struct SqliteStore {
    path: String,
    connection: Mutex<Option<Arc<ConnectionThreadSafe>>>,
}

impl SqliteStore {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            connection: Mutex::new(None),
        }
    }

    fn handle(&self) -> Result<Arc<ConnectionThreadSafe>> {
        self.connection
            .lock()
            .map_err(|_| anyhow!("store connection lock poisoned"))?
            .clone()
            .ok_or_else(|| anyhow!("store is not connected"))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn connect(&self) -> Result<()> {
        if self.handle().is_ok() {
            debug!("Store already connected, skipping");
            return Ok(());
        }

        let path = self.path.clone();
        let connection = tokio::task::spawn_blocking(move || -> Result<ConnectionThreadSafe> {
            if let Some(parent) = Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
            }
            let connection = sqlite::Connection::open_thread_safe(&path)
                .with_context(|| format!("Failed to open database at {path}"))?;
            connection.execute(SCHEMA).context("Failed to apply schema")?;
            Ok(connection)
        })
        .await
        .context("store connect task panicked")??;

        *self
            .connection
            .lock()
            .map_err(|_| anyhow!("store connection lock poisoned"))? = Some(Arc::new(connection));

        info!("✅ Database connected successfully ({})", self.path);
        Ok(())
    }

    async fn central_embeds(&self) -> Result<Vec<CentralEmbed>> {
        let connection = self.handle()?;
        tokio::task::spawn_blocking(move || -> Result<Vec<CentralEmbed>> {
            let mut statement = connection.prepare(
                "SELECT guild_id, channel_id, message_id FROM central_embeds ORDER BY guild_id",
            )?;
            let mut embeds = Vec::new();
            while let State::Row = statement.next()? {
                embeds.push(CentralEmbed {
                    guild_id: statement.read::<i64, _>(0)? as u64,
                    channel_id: statement.read::<i64, _>(1)? as u64,
                    message_id: statement.read::<i64, _>(2)? as u64,
                });
            }
            Ok(embeds)
        })
        .await
        .context("central embed query task panicked")?
    }

    async fn save_central_embed(&self, embed: &CentralEmbed) -> Result<()> {
        let connection = self.handle()?;
        let embed = embed.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut statement = connection.prepare(
                "INSERT INTO central_embeds (guild_id, channel_id, message_id) VALUES (?, ?, ?)
                 ON CONFLICT(guild_id) DO UPDATE SET channel_id = excluded.channel_id,
                 message_id = excluded.message_id, updated_at = CURRENT_TIMESTAMP",
            )?;
            statement.bind((1, embed.guild_id as i64))?;
            statement.bind((2, embed.channel_id as i64))?;
            statement.bind((3, embed.message_id as i64))?;
            while let State::Row = statement.next()? {}
            Ok(())
        })
        .await
        .context("central embed upsert task panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queries_require_connect() {
        let store = SqliteStore::new(":memory:");
        let result = store.central_embeds().await;
        assert!(result.unwrap_err().to_string().contains("not connected"));
    }

    #[tokio::test]
    async fn test_connect_is_repeatable() {
        let store = SqliteStore::new(":memory:");
        store.connect().await.unwrap();
        store.connect().await.unwrap();
        assert!(store.central_embeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_list_central_embeds() {
        let store = SqliteStore::new(":memory:");
        store.connect().await.unwrap();

        let first = CentralEmbed {
            guild_id: 2,
            channel_id: 20,
            message_id: 200,
        };
        let second = CentralEmbed {
            guild_id: 1,
            channel_id: 10,
            message_id: 100,
        };
        store.save_central_embed(&first).await.unwrap();
        store.save_central_embed(&second).await.unwrap();

        // Upsert replaces the panel for an existing guild
        let moved = CentralEmbed {
            guild_id: 2,
            channel_id: 21,
            message_id: 201,
        };
        store.save_central_embed(&moved).await.unwrap();

        let embeds = store.central_embeds().await.unwrap();
        assert_eq!(embeds, vec![second, moved]);
    }
}
