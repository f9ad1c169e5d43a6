//! Application use cases / business logic

pub mod authoring;
pub mod engagement;
pub mod feed;
pub mod friends;

pub use authoring::PostAuthoring;
pub use engagement::Engagement;
pub use feed::{FeedQueryEngine, project_feed};
pub use friends::Friendships;
