//! SQLite-backed store: content, user directory, and friend requests share one pool

mod content;
mod friends;
mod users;

use circlefeed_domain::StoreError;
use sqlx::{
    SqlitePool,
    error::ErrorKind,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;
use time::OffsetDateTime;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        avatar TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        author_id INTEGER NOT NULL REFERENCES users(id),
        caption TEXT,
        image_url TEXT NOT NULL,
        frame TEXT,
        font TEXT,
        created_at_us INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_viewers (
        post_id INTEGER NOT NULL REFERENCES posts(id),
        user_id INTEGER NOT NULL REFERENCES users(id),
        PRIMARY KEY (post_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id),
        author_id INTEGER NOT NULL REFERENCES users(id),
        body TEXT NOT NULL,
        created_at_us INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL REFERENCES posts(id),
        author_id INTEGER NOT NULL REFERENCES users(id),
        kind TEXT NOT NULL,
        created_at_us INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS friend_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sender_id INTEGER NOT NULL REFERENCES users(id),
        receiver_id INTEGER NOT NULL REFERENCES users(id),
        status TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'rejected')),
        created_at_us INTEGER NOT NULL,
        updated_at_us INTEGER NOT NULL,
        UNIQUE (sender_id, receiver_id)
    )
    "#,
    // Feed lookups start from the viewer edge
    "CREATE INDEX IF NOT EXISTS idx_post_viewers_user ON post_viewers(user_id, post_id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at_us DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_comments_author_post ON comments(author_id, post_id)",
    "CREATE INDEX IF NOT EXISTS idx_reactions_author_post ON reactions(author_id, post_id)",
    r#"
    CREATE TRIGGER IF NOT EXISTS posts_created_at_immutable
    BEFORE UPDATE OF created_at_us ON posts
    WHEN NEW.created_at_us IS NOT OLD.created_at_us
    BEGIN
        SELECT RAISE(ABORT, 'posts.created_at_us is immutable');
    END
    "#,
];

/// Id lists are split into chunks of this size before being bound into
/// `IN (...)` clauses, keeping every statement well under SQLite's
/// bound-parameter limit.
pub(crate) const MAX_BOUND_IDS: usize = 500;

/// SQLite store implementing the content, directory, and relationship ports
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(path = %db_path.display(), "Opened SQLite store");

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Database(e.to_string()))?
            .foreign_keys(true);

        // A single connection that never expires keeps the database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        }
        Ok(())
    }
}

/// Constraint violations keep their own variant; everything else is a database fault
pub(crate) fn store_err(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db) if !matches!(db.kind(), ErrorKind::Other) => {
            StoreError::Constraint(db.message().to_string())
        }
        _ => StoreError::Database(e.to_string()),
    }
}

pub(crate) fn to_micros(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000) as i64
}

pub(crate) fn from_micros(us: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(us) * 1_000)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}
