//! Friend requests and the accepted-friend graph

use std::collections::BTreeSet;

use async_trait::async_trait;
use circlefeed_domain::{
    FriendRequest, FriendRequestError, FriendRequestId, FriendRequestStatus, FriendRequestStore,
    RelationshipError, RelationshipProvider, UserId,
};
use time::OffsetDateTime;

use super::{SqliteStore, from_micros, to_micros};

type RequestRecord = (i64, i64, i64, String, i64, i64);

const SELECT_REQUEST: &str =
    "SELECT id, sender_id, receiver_id, status, created_at_us, updated_at_us FROM friend_requests";

fn storage(e: impl std::fmt::Display) -> FriendRequestError {
    FriendRequestError::Storage(e.to_string())
}

fn friend_request(record: RequestRecord) -> Result<FriendRequest, FriendRequestError> {
    let (id, sender, receiver, status, created_at_us, updated_at_us) = record;
    let status = FriendRequestStatus::parse(&status)
        .ok_or_else(|| storage(format!("unknown friend request status '{}'", status)))?;
    Ok(FriendRequest {
        id: FriendRequestId(id),
        sender: UserId(sender),
        receiver: UserId(receiver),
        status,
        created_at: from_micros(created_at_us).map_err(storage)?,
        updated_at: from_micros(updated_at_us).map_err(storage)?,
    })
}

#[async_trait]
impl RelationshipProvider for SqliteStore {
    async fn accepted_friend_ids(
        &self,
        user: UserId,
    ) -> Result<BTreeSet<UserId>, RelationshipError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END
            FROM friend_requests
            WHERE status = 'accepted' AND (sender_id = ?1 OR receiver_id = ?1)
            "#,
        )
        .bind(user.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelationshipError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| UserId(id)).collect())
    }
}

#[async_trait]
impl FriendRequestStore for SqliteStore {
    async fn send_friend_request(
        &self,
        sender: UserId,
        receiver: UserId,
        at: OffsetDateTime,
    ) -> Result<FriendRequest, FriendRequestError> {
        if sender == receiver {
            return Err(FriendRequestError::SelfRequest);
        }

        let mut tx = self.pool.begin().await.map_err(storage)?;

        for user in [sender, receiver] {
            let (known,): (i64,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
                    .bind(user.0)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(storage)?;
            if known == 0 {
                return Err(FriendRequestError::UnknownUser(user));
            }
        }

        let existing: Option<RequestRecord> = sqlx::query_as(&format!(
            "{} WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
            SELECT_REQUEST
        ))
        .bind(sender.0)
        .bind(receiver.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let at_us = to_micros(at);
        let id = match existing.map(friend_request).transpose()? {
            // A rejected pair may try again, in either direction
            Some(previous) if previous.status == FriendRequestStatus::Rejected => {
                sqlx::query(
                    r#"
                    UPDATE friend_requests
                    SET sender_id = ?, receiver_id = ?, status = 'pending',
                        created_at_us = ?, updated_at_us = ?
                    WHERE id = ?
                    "#,
                )
                .bind(sender.0)
                .bind(receiver.0)
                .bind(at_us)
                .bind(at_us)
                .bind(previous.id.0)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
                previous.id.0
            }
            Some(_) => return Err(FriendRequestError::AlreadyExists(sender, receiver)),
            None => sqlx::query(
                r#"
                INSERT INTO friend_requests
                (sender_id, receiver_id, status, created_at_us, updated_at_us)
                VALUES (?, ?, 'pending', ?, ?)
                "#,
            )
            .bind(sender.0)
            .bind(receiver.0)
            .bind(at_us)
            .bind(at_us)
            .execute(&mut *tx)
            .await
            .map_err(storage)?
            .last_insert_rowid(),
        };

        tx.commit().await.map_err(storage)?;

        Ok(FriendRequest {
            id: FriendRequestId(id),
            sender,
            receiver,
            status: FriendRequestStatus::Pending,
            created_at: from_micros(at_us).map_err(storage)?,
            updated_at: from_micros(at_us).map_err(storage)?,
        })
    }

    async fn respond_to_friend_request(
        &self,
        id: FriendRequestId,
        responder: UserId,
        accept: bool,
        at: OffsetDateTime,
    ) -> Result<FriendRequest, FriendRequestError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let record: Option<RequestRecord> =
            sqlx::query_as(&format!("{} WHERE id = ?", SELECT_REQUEST))
                .bind(id.0)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?;

        let mut request = match record {
            Some(record) => friend_request(record)?,
            None => return Err(FriendRequestError::NotFound(id)),
        };

        if request.receiver != responder {
            return Err(FriendRequestError::NotReceiver(responder));
        }

        request.status = request.status.respond(accept)?;
        let at_us = to_micros(at);

        sqlx::query("UPDATE friend_requests SET status = ?, updated_at_us = ? WHERE id = ?")
            .bind(request.status.as_str())
            .bind(at_us)
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;

        request.updated_at = from_micros(at_us).map_err(storage)?;
        Ok(request)
    }

    async fn friend_requests_for(
        &self,
        user: UserId,
    ) -> Result<Vec<FriendRequest>, FriendRequestError> {
        let rows: Vec<RequestRecord> = sqlx::query_as(&format!(
            "{} WHERE sender_id = ?1 OR receiver_id = ?1 ORDER BY created_at_us DESC, id DESC",
            SELECT_REQUEST
        ))
        .bind(user.0)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(friend_request).collect()
    }
}
