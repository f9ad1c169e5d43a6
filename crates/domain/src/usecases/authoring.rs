//! Post authoring use case

use std::sync::Arc;

use crate::{
    error::ServiceError,
    model::{NewPost, NewPostRequest, Post, UserId},
    ports::{Clock, ContentStore, MediaStore, RelationshipProvider, UserDirectory},
    visibility::VisibilitySetBuilder,
};

/// Maximum caption length in characters
pub const MAX_CAPTION_CHARS: usize = 2_200;

/// Creates posts together with their viewer sets
pub struct PostAuthoring<M, D, S, R, Cl>
where
    M: MediaStore + ?Sized,
    D: UserDirectory + ?Sized,
    S: ContentStore + ?Sized,
    R: RelationshipProvider + ?Sized,
    Cl: Clock + ?Sized,
{
    media: Arc<M>,
    visibility: VisibilitySetBuilder<D>,
    store: Arc<S>,
    relationships: Arc<R>,
    clock: Arc<Cl>,
}

impl<M, D, S, R, Cl> PostAuthoring<M, D, S, R, Cl>
where
    M: MediaStore + ?Sized,
    D: UserDirectory + ?Sized,
    S: ContentStore + ?Sized,
    R: RelationshipProvider + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        media: Arc<M>,
        directory: Arc<D>,
        store: Arc<S>,
        relationships: Arc<R>,
        clock: Arc<Cl>,
    ) -> Self {
        Self {
            media,
            visibility: VisibilitySetBuilder::new(directory),
            store,
            relationships,
            clock,
        }
    }

    /// Upload the media, resolve the viewer set, and persist the post with
    /// its viewers in one step.
    ///
    /// Nothing is persisted in the content store unless every stage succeeds.
    /// Retrying after a failure may create a duplicate post.
    pub async fn create_post(&self, request: NewPostRequest) -> Result<Post, ServiceError> {
        let NewPostRequest {
            author,
            caption,
            audience,
            media,
            display,
        } = request;

        let caption = normalize_caption(caption)?;
        let recipients = self
            .recipients(author, audience.recipients, audience.include_friends)
            .await?;

        let upload = async {
            self.media
                .upload_image(&media)
                .await
                .map_err(|e| ServiceError::internal("upload_image", e))
        };
        let viewers = self.visibility.build(author, &recipients);
        let (media_url, viewers) = futures::try_join!(upload, viewers)?;

        let new_post = NewPost {
            author_id: author,
            caption,
            media_url: media_url.clone(),
            display,
            created_at: self.clock.now(),
        };

        let post = match self.store.insert_post(new_post, &viewers).await {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!(media_url = %media_url, author_id = %author, "Uploaded media left without a post");
                return Err(ServiceError::internal("insert_post", e));
            }
        };

        tracing::info!(
            post_id = %post.id,
            author_id = %author,
            viewers = post.viewers.len(),
            "Created post"
        );

        Ok(post)
    }

    async fn recipients(
        &self,
        author: UserId,
        mut recipients: Vec<UserId>,
        include_friends: bool,
    ) -> Result<Vec<UserId>, ServiceError> {
        if include_friends {
            let friends = self
                .relationships
                .accepted_friend_ids(author)
                .await
                .map_err(|e| ServiceError::internal("accepted_friend_ids", e))?;
            tracing::debug!(author_id = %author, friends = friends.len(), "Addressing friends");
            recipients.extend(friends);
        }
        Ok(recipients)
    }
}

fn normalize_caption(caption: Option<String>) -> Result<Option<String>, ServiceError> {
    let Some(caption) = caption else {
        return Ok(None);
    };
    let trimmed = caption.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_CAPTION_CHARS {
        return Err(ServiceError::Validation(format!(
            "caption longer than {} characters",
            MAX_CAPTION_CHARS
        )));
    }
    Ok(Some(trimmed.to_string()))
}
