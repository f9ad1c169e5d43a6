//! Friend request workflow

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    error::ServiceError,
    model::{FriendRequest, FriendRequestError, FriendRequestId, UserId},
    ports::{Clock, FriendRequestStore},
};

/// Thin use case over the friend request store
pub struct Friendships<F: FriendRequestStore + ?Sized, Cl: Clock + ?Sized> {
    store: Arc<F>,
    clock: Arc<Cl>,
}

impl<F: FriendRequestStore + ?Sized, Cl: Clock + ?Sized> Friendships<F, Cl> {
    pub fn new(store: Arc<F>, clock: Arc<Cl>) -> Self {
        Self { store, clock }
    }

    pub async fn request(
        &self,
        sender: UserId,
        receiver: UserId,
    ) -> Result<FriendRequest, ServiceError> {
        let request = self
            .store
            .send_friend_request(sender, receiver, self.clock.now())
            .await
            .map_err(into_service_error)?;
        tracing::info!(request_id = %request.id, sender = %sender, receiver = %receiver, "Sent friend request");
        Ok(request)
    }

    pub async fn respond(
        &self,
        id: FriendRequestId,
        responder: UserId,
        accept: bool,
    ) -> Result<FriendRequest, ServiceError> {
        let request = self
            .store
            .respond_to_friend_request(id, responder, accept, self.clock.now())
            .await
            .map_err(into_service_error)?;
        tracing::info!(request_id = %id, status = %request.status, "Answered friend request");
        Ok(request)
    }

    pub async fn friends_of(&self, user: UserId) -> Result<BTreeSet<UserId>, ServiceError> {
        self.store
            .accepted_friend_ids(user)
            .await
            .map_err(|e| ServiceError::internal("accepted_friend_ids", e))
    }

    pub async fn requests_for(&self, user: UserId) -> Result<Vec<FriendRequest>, ServiceError> {
        self.store
            .friend_requests_for(user)
            .await
            .map_err(into_service_error)
    }
}

fn into_service_error(err: FriendRequestError) -> ServiceError {
    match err {
        FriendRequestError::NotFound(_) => ServiceError::NotFound(err.to_string()),
        FriendRequestError::Storage(_) => ServiceError::internal("friend_request", err),
        FriendRequestError::SelfRequest
        | FriendRequestError::AlreadyExists(..)
        | FriendRequestError::NotReceiver(_)
        | FriendRequestError::InvalidTransition { .. }
        | FriendRequestError::UnknownUser(_) => ServiceError::Validation(err.to_string()),
    }
}
