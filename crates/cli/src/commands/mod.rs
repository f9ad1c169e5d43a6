//! Subcommand implementations

pub mod config;
pub mod engage;
pub mod feed;
pub mod friends;
pub mod post;
pub mod user;

use anyhow::{Context, Result};
use circlefeed_adapters::{media::FsMediaStore, store::SqliteStore};
use circlefeed_domain::SystemClock;
use serde::Serialize;
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::config::AppConfig;

/// Adapters shared by every command that touches stored content
pub struct Backend {
    pub store: Arc<SqliteStore>,
    pub media: Arc<FsMediaStore>,
    pub clock: Arc<SystemClock>,
}

impl Backend {
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let store = SqliteStore::new(&config.general.database_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database: {}",
                    config.general.database_path.display()
                )
            })?;
        let media = FsMediaStore::new(&config.media.dir, config.media.limits());

        Ok(Self {
            store: Arc::new(store),
            media: Arc::new(media),
            clock: Arc::new(SystemClock),
        })
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}
