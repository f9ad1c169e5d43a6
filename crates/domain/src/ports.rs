//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    Comment, FeedQuery, FeedRow, FriendRequest, FriendRequestError, FriendRequestId, MediaPayload,
    MediaRef, NewComment, NewPost, NewReaction, Post, PostId, Reaction, UserId, UserProjection,
    ViewerActivity, ViewerSet,
};

/// Error type for content store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Constraint violated: {0}")]
    Constraint(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for persisting posts, their viewer sets, and activity on them
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert a post together with its viewer set, atomically
    async fn insert_post(&self, post: NewPost, viewers: &ViewerSet) -> Result<Post, StoreError>;

    /// Look up a post by id, ignoring visibility
    async fn find_post(&self, id: PostId) -> Result<Option<Post>, StoreError>;

    /// Posts visible to `query.viewer`, newest first, with author projections
    async fn query_feed(&self, query: &FeedQuery) -> Result<Vec<FeedRow>, StoreError>;

    /// The viewer's own comment counts and reactions on the given posts
    async fn viewer_activity(
        &self,
        viewer: UserId,
        posts: &[PostId],
    ) -> Result<ViewerActivity, StoreError>;

    /// Whether `user` is in the viewer set of `post`
    async fn is_viewer(&self, post: PostId, user: UserId) -> Result<bool, StoreError>;

    /// Append a comment
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, StoreError>;

    /// Append a reaction
    async fn insert_reaction(&self, reaction: NewReaction) -> Result<Reaction, StoreError>;
}

/// Error type for user directory lookups
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Port for resolving user ids to display projections
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve the given ids. Unknown ids are left out of the result, so a
    /// shorter list than requested means some ids did not resolve.
    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<UserProjection>, DirectoryError>;
}

/// Error type for media uploads
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Upload rejected: {0}")]
    Rejected(String),
}

/// Port for storing uploaded media
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store the image and return a durable reference to it
    async fn upload_image(&self, payload: &MediaPayload) -> Result<MediaRef, MediaError>;
}

/// Error type for relationship lookups
#[derive(Debug, Error)]
pub enum RelationshipError {
    #[error("Relationship lookup failed: {0}")]
    Unavailable(String),
}

/// Port exposing the accepted-friend graph
#[async_trait]
pub trait RelationshipProvider: Send + Sync {
    /// Users currently in an accepted friend relationship with `user`
    async fn accepted_friend_ids(&self, user: UserId)
    -> Result<BTreeSet<UserId>, RelationshipError>;
}

/// Port for the friend request workflow (request, accept, reject)
#[async_trait]
pub trait FriendRequestStore: RelationshipProvider {
    /// Open a pending request from `sender` to `receiver`
    async fn send_friend_request(
        &self,
        sender: UserId,
        receiver: UserId,
        at: OffsetDateTime,
    ) -> Result<FriendRequest, FriendRequestError>;

    /// Accept or reject a pending request; only its receiver may answer
    async fn respond_to_friend_request(
        &self,
        id: FriendRequestId,
        responder: UserId,
        accept: bool,
        at: OffsetDateTime,
    ) -> Result<FriendRequest, FriendRequestError>;

    /// All requests sent or received by `user`, newest first
    async fn friend_requests_for(&self, user: UserId)
    -> Result<Vec<FriendRequest>, FriendRequestError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
