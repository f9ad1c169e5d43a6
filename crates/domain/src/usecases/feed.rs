//! Feed query use case: viewer-scoped reads

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::ServiceError,
    model::{FeedQuery, FeedRow, Post, PostId, PostView, ReactionView, UserId, ViewerActivity},
    ports::ContentStore,
};

/// Read path over the content store
pub struct FeedQueryEngine<S: ContentStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ContentStore + ?Sized> Clone for FeedQueryEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ContentStore + ?Sized> FeedQueryEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Posts the viewer may see, newest first, decorated with the viewer's
    /// own comment count and reactions.
    pub async fn viewable_posts(&self, query: FeedQuery) -> Result<Vec<PostView>, ServiceError> {
        let rows = self
            .store
            .query_feed(&query)
            .await
            .map_err(|e| ServiceError::internal("query_feed", e))?;

        if rows.is_empty() {
            tracing::debug!(viewer_id = %query.viewer, author = ?query.author, "Empty feed");
            return Ok(vec![]);
        }

        let post_ids: Vec<PostId> = rows.iter().map(|r| r.id).collect();
        let activity = self
            .store
            .viewer_activity(query.viewer, &post_ids)
            .await
            .map_err(|e| ServiceError::internal("viewer_activity", e))?;

        let views = project_feed(query.viewer, rows, activity);

        tracing::info!(
            viewer_id = %query.viewer,
            author = ?query.author,
            count = views.len(),
            "Loaded feed"
        );

        Ok(views)
    }

    /// Unrestricted lookup by id, for internal callers only
    pub async fn get_post_by_id(&self, id: PostId) -> Result<Post, ServiceError> {
        self.store
            .find_post(id)
            .await
            .map_err(|e| ServiceError::internal("find_post", e))?
            .ok_or_else(|| ServiceError::NotFound(format!("Post with id {} not found", id)))
    }
}

/// Merge feed rows with the viewer's activity.
///
/// Posts are ordered by creation time then id, both descending. Reactions are
/// kept only if they belong to `viewer` and a returned post, ordered the same
/// way.
pub fn project_feed(viewer: UserId, rows: Vec<FeedRow>, activity: ViewerActivity) -> Vec<PostView> {
    let ViewerActivity {
        comment_counts,
        reactions,
    } = activity;

    let mut by_post: HashMap<PostId, Vec<ReactionView>> = HashMap::new();
    for reaction in reactions {
        if reaction.reactor.id == viewer {
            by_post.entry(reaction.post_id).or_default().push(reaction);
        }
    }

    let mut views: Vec<PostView> = rows
        .into_iter()
        .map(|row| {
            let mut reactions = by_post.remove(&row.id).unwrap_or_default();
            reactions.sort_by_key(|r| Reverse((r.created_at, r.id)));

            PostView {
                id: row.id,
                caption: row.caption,
                media_url: row.media_url,
                display: row.display,
                created_at: row.created_at,
                author: row.author,
                comment_count: comment_counts.get(&row.id).copied().unwrap_or(0),
                reactions,
            }
        })
        .collect();

    views.sort_by_key(|v| Reverse((v.created_at, v.id)));
    views
}
