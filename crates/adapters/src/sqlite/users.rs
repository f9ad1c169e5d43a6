//! User directory backed by the `users` table

use async_trait::async_trait;
use circlefeed_domain::{DirectoryError, UserDirectory, UserId, UserProjection};
use sqlx::{QueryBuilder, Sqlite, error::ErrorKind};

use super::{MAX_BOUND_IDS, SqliteStore};

impl SqliteStore {
    /// Register a new user. Usernames are unique.
    pub async fn register_user(
        &self,
        username: &str,
        avatar: Option<&str>,
    ) -> Result<UserProjection, DirectoryError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DirectoryError::Conflict("username must not be empty".to_string()));
        }

        let result = sqlx::query("INSERT INTO users (username, avatar) VALUES (?, ?)")
            .bind(username)
            .bind(avatar)
            .execute(&self.pool)
            .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) => {
                let duplicate = e
                    .as_database_error()
                    .is_some_and(|db| matches!(db.kind(), ErrorKind::UniqueViolation));
                return Err(if duplicate {
                    DirectoryError::Conflict(format!("username '{}' is taken", username))
                } else {
                    DirectoryError::Unavailable(e.to_string())
                });
            }
        };

        tracing::info!(user_id = id, username = %username, "Registered user");

        Ok(UserProjection {
            id: UserId(id),
            username: username.to_string(),
            avatar: avatar.map(str::to_string),
        })
    }

    /// All users, ordered by id
    pub async fn list_users(&self) -> Result<Vec<UserProjection>, DirectoryError> {
        let rows: Vec<(i64, String, Option<String>)> =
            sqlx::query_as("SELECT id, username, avatar FROM users ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        Ok(rows.into_iter().map(projection).collect())
    }
}

fn projection((id, username, avatar): (i64, String, Option<String>)) -> UserProjection {
    UserProjection {
        id: UserId(id),
        username,
        avatar,
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<UserProjection>, DirectoryError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut rows: Vec<(i64, String, Option<String>)> = Vec::new();
        for chunk in ids.chunks(MAX_BOUND_IDS) {
            let mut builder =
                QueryBuilder::<Sqlite>::new("SELECT id, username, avatar FROM users WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.0);
            }
            separated.push_unseparated(")");

            rows.extend(
                builder
                    .build_query_as::<(i64, String, Option<String>)>()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| DirectoryError::Unavailable(e.to_string()))?,
            );
        }

        // The same id may be requested in more than one chunk
        rows.sort_by_key(|(id, ..)| *id);
        rows.dedup_by_key(|(id, ..)| *id);

        Ok(rows.into_iter().map(projection).collect())
    }
}
