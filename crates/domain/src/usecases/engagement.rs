//! Comments and reactions within a post's audience

use std::sync::Arc;

use crate::{
    error::ServiceError,
    model::{Comment, NewComment, NewReaction, PostId, Reaction, ReactionKind, UserId},
    ports::{Clock, ContentStore},
};

/// Maximum comment length in characters
pub const MAX_COMMENT_CHARS: usize = 1_000;

/// Appends activity to posts the actor is allowed to see
pub struct Engagement<S: ContentStore + ?Sized, Cl: Clock + ?Sized> {
    store: Arc<S>,
    clock: Arc<Cl>,
}

impl<S: ContentStore + ?Sized, Cl: Clock + ?Sized> Engagement<S, Cl> {
    pub fn new(store: Arc<S>, clock: Arc<Cl>) -> Self {
        Self { store, clock }
    }

    pub async fn comment(
        &self,
        actor: UserId,
        post: PostId,
        body: &str,
    ) -> Result<Comment, ServiceError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ServiceError::Validation(
                "comment must not be empty".to_string(),
            ));
        }
        if body.chars().count() > MAX_COMMENT_CHARS {
            return Err(ServiceError::Validation(format!(
                "comment longer than {} characters",
                MAX_COMMENT_CHARS
            )));
        }

        self.ensure_visible(actor, post).await?;

        let comment = self
            .store
            .insert_comment(NewComment {
                post_id: post,
                author_id: actor,
                body: body.to_string(),
                created_at: self.clock.now(),
            })
            .await
            .map_err(|e| ServiceError::internal("insert_comment", e))?;

        tracing::info!(post_id = %post, user_id = %actor, comment_id = comment.id, "Added comment");
        Ok(comment)
    }

    pub async fn react(
        &self,
        actor: UserId,
        post: PostId,
        kind: &str,
    ) -> Result<Reaction, ServiceError> {
        let kind = ReactionKind::parse(kind).map_err(ServiceError::Validation)?;

        self.ensure_visible(actor, post).await?;

        let reaction = self
            .store
            .insert_reaction(NewReaction {
                post_id: post,
                author_id: actor,
                kind,
                created_at: self.clock.now(),
            })
            .await
            .map_err(|e| ServiceError::internal("insert_reaction", e))?;

        tracing::info!(
            post_id = %post,
            user_id = %actor,
            kind = %reaction.kind,
            "Added reaction"
        );
        Ok(reaction)
    }

    /// Posts outside the actor's audience look the same as missing ones
    async fn ensure_visible(&self, actor: UserId, post: PostId) -> Result<(), ServiceError> {
        let visible = self
            .store
            .is_viewer(post, actor)
            .await
            .map_err(|e| ServiceError::internal("is_viewer", e))?;
        if !visible {
            return Err(ServiceError::NotFound(format!(
                "Post with id {} not found",
                post
            )));
        }
        Ok(())
    }
}
