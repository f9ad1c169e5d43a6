//! In-memory store for testing and offline mode

use async_trait::async_trait;
use circlefeed_domain::{
    Comment, ContentStore, DirectoryError, FeedQuery, FeedRow, FriendRequest, FriendRequestError,
    FriendRequestId, FriendRequestStatus, FriendRequestStore, NewComment, NewPost, NewReaction,
    Post, PostId, Reaction, ReactionView, RelationshipError, RelationshipProvider, StoreError,
    UserDirectory, UserId, UserProjection, ViewerActivity, ViewerSet,
};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use time::OffsetDateTime;

#[derive(Default)]
struct State {
    users: BTreeMap<UserId, UserProjection>,
    posts: BTreeMap<PostId, Post>,
    comments: Vec<Comment>,
    reactions: Vec<Reaction>,
    friend_requests: BTreeMap<FriendRequestId, FriendRequest>,
}

impl State {
    fn next_id<K: Ord + Copy, V>(map: &BTreeMap<K, V>, raw: impl Fn(&K) -> i64) -> i64 {
        map.keys().next_back().map(|k| raw(k) + 1).unwrap_or(1)
    }

    fn check_user(&self, user: UserId) -> Result<(), StoreError> {
        if self.users.contains_key(&user) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("unknown user {}", user)))
        }
    }

    fn check_post(&self, post: PostId) -> Result<(), StoreError> {
        if self.posts.contains_key(&post) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("unknown post {}", post)))
        }
    }
}

/// In-memory implementation of every storage port.
///
/// A single lock guards all tables so multi-table writes are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user. Usernames are unique.
    pub fn register_user(
        &self,
        username: &str,
        avatar: Option<&str>,
    ) -> Result<UserProjection, DirectoryError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        if state.users.values().any(|u| u.username == username) {
            return Err(DirectoryError::Conflict(format!(
                "username '{}' is taken",
                username
            )));
        }

        let id = UserId(State::next_id(&state.users, |k| k.0));
        let user = UserProjection {
            id,
            username: username.to_string(),
            avatar: avatar.map(str::to_string),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn insert_post(&self, post: NewPost, viewers: &ViewerSet) -> Result<Post, StoreError> {
        let mut state = self.write()?;

        if !viewers.contains(post.author_id) {
            return Err(StoreError::Constraint(format!(
                "author {} missing from viewer set",
                post.author_id
            )));
        }
        for viewer in viewers.iter() {
            state.check_user(viewer)?;
        }

        let id = PostId(State::next_id(&state.posts, |k| k.0));
        let stored = Post {
            id,
            author_id: post.author_id,
            caption: post.caption,
            media_url: post.media_url,
            display: post.display,
            created_at: post.created_at,
            viewers: viewers.clone(),
        };
        state.posts.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.read()?.posts.get(&id).cloned())
    }

    async fn query_feed(&self, query: &FeedQuery) -> Result<Vec<FeedRow>, StoreError> {
        let state = self.read()?;

        let mut rows = Vec::new();
        for post in state.posts.values() {
            if !post.viewers.contains(query.viewer) {
                continue;
            }
            if query.author.is_some_and(|a| a != post.author_id) {
                continue;
            }
            let author = state.users.get(&post.author_id).cloned().ok_or_else(|| {
                StoreError::Constraint(format!("post {} has unknown author", post.id))
            })?;
            rows.push(FeedRow {
                id: post.id,
                caption: post.caption.clone(),
                media_url: post.media_url.clone(),
                display: post.display.clone(),
                created_at: post.created_at,
                author,
            });
        }

        rows.sort_by_key(|r| Reverse((r.created_at, r.id)));
        Ok(rows)
    }

    async fn viewer_activity(
        &self,
        viewer: UserId,
        posts: &[PostId],
    ) -> Result<ViewerActivity, StoreError> {
        let state = self.read()?;
        let wanted: BTreeSet<PostId> = posts.iter().copied().collect();

        let mut comment_counts = BTreeMap::new();
        for comment in &state.comments {
            if comment.author_id == viewer && wanted.contains(&comment.post_id) {
                *comment_counts.entry(comment.post_id).or_insert(0) += 1;
            }
        }

        let mut reactions: Vec<ReactionView> = Vec::new();
        if let Some(reactor) = state.users.get(&viewer) {
            for reaction in &state.reactions {
                if reaction.author_id == viewer && wanted.contains(&reaction.post_id) {
                    reactions.push(ReactionView {
                        id: reaction.id,
                        post_id: reaction.post_id,
                        kind: reaction.kind.clone(),
                        created_at: reaction.created_at,
                        reactor: reactor.clone(),
                    });
                }
            }
        }
        reactions.sort_by_key(|r| Reverse((r.created_at, r.id)));

        Ok(ViewerActivity {
            comment_counts,
            reactions,
        })
    }

    async fn is_viewer(&self, post: PostId, user: UserId) -> Result<bool, StoreError> {
        Ok(self
            .read()?
            .posts
            .get(&post)
            .is_some_and(|p| p.viewers.contains(user)))
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, StoreError> {
        let mut state = self.write()?;
        state.check_post(comment.post_id)?;
        state.check_user(comment.author_id)?;

        let stored = Comment {
            id: state.comments.len() as i64 + 1,
            post_id: comment.post_id,
            author_id: comment.author_id,
            body: comment.body,
            created_at: comment.created_at,
        };
        state.comments.push(stored.clone());
        Ok(stored)
    }

    async fn insert_reaction(&self, reaction: NewReaction) -> Result<Reaction, StoreError> {
        let mut state = self.write()?;
        state.check_post(reaction.post_id)?;
        state.check_user(reaction.author_id)?;

        let stored = Reaction {
            id: state.reactions.len() as i64 + 1,
            post_id: reaction.post_id,
            author_id: reaction.author_id,
            kind: reaction.kind,
            created_at: reaction.created_at,
        };
        state.reactions.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<UserProjection>, DirectoryError> {
        let state = self
            .state
            .read()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        let wanted: BTreeSet<UserId> = ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| state.users.get(&id).cloned())
            .collect())
    }
}

#[async_trait]
impl RelationshipProvider for InMemoryStore {
    async fn accepted_friend_ids(
        &self,
        user: UserId,
    ) -> Result<BTreeSet<UserId>, RelationshipError> {
        let state = self
            .state
            .read()
            .map_err(|e| RelationshipError::Unavailable(e.to_string()))?;
        Ok(state
            .friend_requests
            .values()
            .filter(|r| r.status == FriendRequestStatus::Accepted)
            .filter_map(|r| {
                if r.sender == user {
                    Some(r.receiver)
                } else if r.receiver == user {
                    Some(r.sender)
                } else {
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl FriendRequestStore for InMemoryStore {
    async fn send_friend_request(
        &self,
        sender: UserId,
        receiver: UserId,
        at: OffsetDateTime,
    ) -> Result<FriendRequest, FriendRequestError> {
        if sender == receiver {
            return Err(FriendRequestError::SelfRequest);
        }
        let mut state = self
            .state
            .write()
            .map_err(|e| FriendRequestError::Storage(e.to_string()))?;

        for user in [sender, receiver] {
            if !state.users.contains_key(&user) {
                return Err(FriendRequestError::UnknownUser(user));
            }
        }

        let existing = state
            .friend_requests
            .values()
            .find(|r| {
                (r.sender == sender && r.receiver == receiver)
                    || (r.sender == receiver && r.receiver == sender)
            })
            .map(|r| (r.id, r.status));

        let id = match existing {
            Some((id, FriendRequestStatus::Rejected)) => id,
            Some(_) => return Err(FriendRequestError::AlreadyExists(sender, receiver)),
            None => FriendRequestId(State::next_id(&state.friend_requests, |k| k.0)),
        };

        let request = FriendRequest {
            id,
            sender,
            receiver,
            status: FriendRequestStatus::Pending,
            created_at: at,
            updated_at: at,
        };
        state.friend_requests.insert(id, request.clone());
        Ok(request)
    }

    async fn respond_to_friend_request(
        &self,
        id: FriendRequestId,
        responder: UserId,
        accept: bool,
        at: OffsetDateTime,
    ) -> Result<FriendRequest, FriendRequestError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| FriendRequestError::Storage(e.to_string()))?;
        let request = state
            .friend_requests
            .get_mut(&id)
            .ok_or(FriendRequestError::NotFound(id))?;

        if request.receiver != responder {
            return Err(FriendRequestError::NotReceiver(responder));
        }
        request.status = request.status.respond(accept)?;
        request.updated_at = at;
        Ok(request.clone())
    }

    async fn friend_requests_for(
        &self,
        user: UserId,
    ) -> Result<Vec<FriendRequest>, FriendRequestError> {
        let state = self
            .state
            .read()
            .map_err(|e| FriendRequestError::Storage(e.to_string()))?;
        let mut requests: Vec<FriendRequest> = state
            .friend_requests
            .values()
            .filter(|r| r.sender == user || r.receiver == user)
            .cloned()
            .collect();
        requests.sort_by_key(|r| Reverse((r.created_at, r.id)));
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circlefeed_domain::{DisplayAttrs, MediaRef, ReactionKind};
    use time::Duration;

    fn new_post(author: UserId, minutes: i64) -> NewPost {
        NewPost {
            author_id: author,
            caption: None,
            media_url: MediaRef(format!("media/{}.jpg", minutes)),
            display: DisplayAttrs::default(),
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn test_insert_post_rejects_unknown_viewer_atomically() {
        let store = InMemoryStore::new();
        let ana = store.register_user("ana", None).unwrap().id;

        let viewers = ViewerSet::from_parts(ana, &[UserId(9)]);
        let result = store.insert_post(new_post(ana, 0), &viewers).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert!(store.find_post(PostId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_feed_and_activity_match_sqlite_semantics() {
        let store = InMemoryStore::new();
        let ana = store.register_user("ana", None).unwrap().id;
        let ben = store.register_user("ben", Some("b.png")).unwrap().id;

        let older = store
            .insert_post(new_post(ana, 1), &ViewerSet::from_parts(ana, &[ben]))
            .await
            .unwrap();
        let newer = store
            .insert_post(new_post(ana, 2), &ViewerSet::from_parts(ana, &[]))
            .await
            .unwrap();

        let ana_feed = store.query_feed(&FeedQuery::new(ana, 0)).await.unwrap();
        let ids: Vec<PostId> = ana_feed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        let ben_feed = store.query_feed(&FeedQuery::new(ben, 0)).await.unwrap();
        assert_eq!(ben_feed.len(), 1);

        store
            .insert_reaction(NewReaction {
                post_id: older.id,
                author_id: ben,
                kind: ReactionKind::parse("like").unwrap(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            })
            .await
            .unwrap();

        let activity = store.viewer_activity(ben, &[older.id]).await.unwrap();
        assert_eq!(activity.reactions.len(), 1);
        assert_eq!(activity.reactions[0].reactor.avatar.as_deref(), Some("b.png"));
        assert!(store
            .viewer_activity(ana, &[older.id])
            .await
            .unwrap()
            .reactions
            .is_empty());
    }

    #[tokio::test]
    async fn test_friend_workflow() {
        let store = InMemoryStore::new();
        let ana = store.register_user("ana", None).unwrap().id;
        let ben = store.register_user("ben", None).unwrap().id;

        let request = store
            .send_friend_request(ana, ben, OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();
        store
            .respond_to_friend_request(request.id, ben, true, OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();

        assert!(store.accepted_friend_ids(ana).await.unwrap().contains(&ben));
        assert!(matches!(
            store
                .send_friend_request(ben, ana, OffsetDateTime::UNIX_EPOCH)
                .await,
            Err(FriendRequestError::AlreadyExists(..))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let store = InMemoryStore::new();
        store.register_user("ana", None).unwrap();
        assert!(matches!(
            store.register_user("ana", None),
            Err(DirectoryError::Conflict(_))
        ));
    }
}
