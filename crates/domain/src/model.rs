//! Domain models and value objects

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifier of a registered user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a friend request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FriendRequestId(pub i64);

impl fmt::Display for FriendRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimal display projection of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProjection {
    pub id: UserId,
    pub username: String,
    pub avatar: Option<String>,
}

/// Durable reference to uploaded media, as returned by the media store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw media handed to the media store
#[derive(Debug, Clone)]
pub struct MediaPayload {
    /// Original file name, used for the extension only
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl MediaPayload {
    /// Lowercased file extension, if any
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Opaque styling tokens attached to a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAttrs {
    pub frame: Option<String>,
    pub font: Option<String>,
}

/// The authoritative set of users allowed to read a post.
///
/// Always sorted, deduplicated and non-empty: it can only be built around an
/// author, who is always a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerSet(Vec<UserId>);

impl ViewerSet {
    /// `{author} ∪ recipients`, independent of recipient order or repeats
    pub fn from_parts(author: UserId, recipients: &[UserId]) -> Self {
        let mut ids = Vec::with_capacity(recipients.len() + 1);
        ids.push(author);
        ids.extend_from_slice(recipients);
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    /// Rebuild a set loaded from storage. Returns `None` if `author` is missing.
    pub fn from_stored(author: UserId, mut ids: Vec<UserId>) -> Option<Self> {
        ids.sort_unstable();
        ids.dedup();
        if ids.binary_search(&author).is_err() {
            return None;
        }
        Some(Self(ids))
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.0.binary_search(&user).is_ok()
    }

    pub fn as_slice(&self) -> &[UserId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = UserId> + '_ {
        self.0.iter().copied()
    }
}

/// A persisted post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub caption: Option<String>,
    pub media_url: MediaRef,
    #[serde(flatten)]
    pub display: DisplayAttrs,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub viewers: ViewerSet,
}

/// Post row ready for insertion; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: UserId,
    pub caption: Option<String>,
    pub media_url: MediaRef,
    pub display: DisplayAttrs,
    pub created_at: OffsetDateTime,
}

/// Who a new post is addressed to
#[derive(Debug, Clone, Default)]
pub struct Audience {
    /// Explicitly chosen recipients
    pub recipients: Vec<UserId>,
    /// Also address every accepted friend of the author
    pub include_friends: bool,
}

impl Audience {
    pub fn explicit(recipients: Vec<UserId>) -> Self {
        Self {
            recipients,
            include_friends: false,
        }
    }

    pub fn friends() -> Self {
        Self {
            recipients: vec![],
            include_friends: true,
        }
    }
}

/// Input for the post authoring use case
#[derive(Debug, Clone)]
pub struct NewPostRequest {
    pub author: UserId,
    pub caption: Option<String>,
    pub audience: Audience,
    pub media: MediaPayload,
    pub display: DisplayAttrs,
}

/// Filters for a feed read.
///
/// The join graph is fixed; only these values vary between queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    /// The requesting user; only posts they can view are returned
    pub viewer: UserId,
    /// Restrict to a single author
    pub author: Option<UserId>,
}

impl FeedQuery {
    /// Build from raw ids, where an author filter of 0 means "any author"
    pub fn new(viewer: UserId, author_filter: i64) -> Self {
        let author = (author_filter != 0).then_some(UserId(author_filter));
        Self { viewer, author }
    }
}

/// A post as returned by the feed query, before viewer-scoped decoration
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRow {
    pub id: PostId,
    pub caption: Option<String>,
    pub media_url: MediaRef,
    pub display: DisplayAttrs,
    pub created_at: OffsetDateTime,
    pub author: UserProjection,
}

/// Validated reaction kind: a short lowercase token such as `like` or `heart_eyes`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionKind(String);

impl ReactionKind {
    pub const MAX_LEN: usize = 32;

    pub fn parse(raw: &str) -> Result<Self, String> {
        let kind = raw.trim().to_ascii_lowercase();
        if kind.is_empty() {
            return Err("reaction kind must not be empty".to_string());
        }
        if kind.len() > Self::MAX_LEN {
            return Err(format!(
                "reaction kind longer than {} characters",
                Self::MAX_LEN
            ));
        }
        if !kind
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!("invalid reaction kind '{}'", raw.trim()));
        }
        Ok(Self(kind))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reaction decorated with its reactor's display projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionView {
    pub id: i64,
    pub post_id: PostId,
    pub kind: ReactionKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub reactor: UserProjection,
}

/// The requesting viewer's own activity across a batch of posts
#[derive(Debug, Clone, Default)]
pub struct ViewerActivity {
    /// Number of comments the viewer wrote, per post (absent = 0)
    pub comment_counts: BTreeMap<PostId, u64>,
    /// The viewer's reactions on any of the posts
    pub reactions: Vec<ReactionView>,
}

/// A feed entry as seen by one viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostView {
    pub id: PostId,
    pub caption: Option<String>,
    pub media_url: MediaRef,
    #[serde(flatten)]
    pub display: DisplayAttrs,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author: UserProjection,
    /// Comments written by the requesting viewer
    pub comment_count: u64,
    /// Reactions left by the requesting viewer, newest first
    pub reactions: Vec<ReactionView>,
}

/// A persisted comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: PostId,
    pub author_id: UserId,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: PostId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: OffsetDateTime,
}

/// A persisted reaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: i64,
    pub post_id: PostId,
    pub author_id: UserId,
    pub kind: ReactionKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewReaction {
    pub post_id: PostId,
    pub author_id: UserId,
    pub kind: ReactionKind,
    pub created_at: OffsetDateTime,
}

/// State of a friend request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Apply the receiver's answer. Only pending requests can be answered.
    pub fn respond(self, accept: bool) -> Result<Self, FriendRequestError> {
        let to = if accept {
            Self::Accepted
        } else {
            Self::Rejected
        };
        match self {
            Self::Pending => Ok(to),
            from => Err(FriendRequestError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for FriendRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A friend request between two users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: FriendRequestId,
    pub sender: UserId,
    pub receiver: UserId,
    pub status: FriendRequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Errors raised by the friend request workflow
#[derive(Debug, thiserror::Error)]
pub enum FriendRequestError {
    #[error("users cannot befriend themselves")]
    SelfRequest,
    #[error("a request between {0} and {1} already exists")]
    AlreadyExists(UserId, UserId),
    #[error("friend request {0} not found")]
    NotFound(FriendRequestId),
    #[error("user {0} is not the receiver of this request")]
    NotReceiver(UserId),
    #[error("cannot move a request from {from} to {to}")]
    InvalidTransition {
        from: FriendRequestStatus,
        to: FriendRequestStatus,
    },
    #[error("unknown user {0}")]
    UnknownUser(UserId),
    #[error("Storage error: {0}")]
    Storage(String),
}
