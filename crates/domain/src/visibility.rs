//! Viewer set construction for new posts

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::model::{UserId, ViewerSet};
use crate::ports::UserDirectory;

/// Builds the viewer set of a post and checks every member exists
pub struct VisibilitySetBuilder<D: UserDirectory + ?Sized> {
    directory: Arc<D>,
}

impl<D: UserDirectory + ?Sized> VisibilitySetBuilder<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// `{author} ∪ recipients`, sorted and deduplicated.
    ///
    /// Fails with [`ServiceError::Validation`] naming every id the directory
    /// could not resolve.
    pub async fn build(
        &self,
        author: UserId,
        recipients: &[UserId],
    ) -> Result<ViewerSet, ServiceError> {
        let viewers = ViewerSet::from_parts(author, recipients);

        let resolved = self
            .directory
            .users_by_ids(viewers.as_slice())
            .await
            .map_err(|e| ServiceError::internal("resolve_viewers", e))?;

        let found: BTreeSet<UserId> = resolved.iter().map(|u| u.id).collect();
        let missing: Vec<String> = viewers
            .iter()
            .filter(|id| !found.contains(id))
            .map(|id| id.to_string())
            .collect();

        if !missing.is_empty() {
            tracing::debug!(author = %author, missing = ?missing, "Unresolved viewer ids");
            return Err(ServiceError::Validation(format!(
                "unknown user ids: {}",
                missing.join(", ")
            )));
        }

        Ok(viewers)
    }
}
