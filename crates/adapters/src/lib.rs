//! circlefeed adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `store`: SQLite and in-memory stores (content, users, friend requests)
//! - `media`: Filesystem media store

mod media_fs;
mod sqlite;
mod store_memory;

/// Re-exports for store adapters
pub mod store {
    pub use crate::sqlite::SqliteStore;
    pub use crate::store_memory::InMemoryStore;
}

/// Re-exports for media adapters
pub mod media {
    pub use crate::media_fs::{FsMediaStore, MediaLimits};
}
