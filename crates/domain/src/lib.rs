//! circlefeed domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `visibility`: Viewer set construction for new posts
//! - `usecases`: Authoring, feed reads, engagement, and friend requests
//! - `error`: The caller-facing error taxonomy

pub mod error;
pub mod model;
pub mod ports;
pub mod usecases;
pub mod visibility;

pub use error::ServiceError;
pub use model::*;
pub use ports::*;
pub use visibility::VisibilitySetBuilder;
