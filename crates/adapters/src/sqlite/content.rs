//! Posts, viewer sets, comments, and reactions

use async_trait::async_trait;
use circlefeed_domain::{
    Comment, ContentStore, DisplayAttrs, FeedQuery, FeedRow, MediaRef, NewComment, NewPost,
    NewReaction, Post, PostId, Reaction, ReactionKind, ReactionView, StoreError, UserId,
    UserProjection, ViewerActivity, ViewerSet,
};
use sqlx::{
    QueryBuilder, Sqlite,
    query::QueryAs,
    sqlite::SqliteArguments,
};
use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::{MAX_BOUND_IDS, SqliteStore, from_micros, store_err, to_micros};

type PostRecord = (
    i64,
    i64,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    i64,
);

type FeedRecord = (
    i64,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    i64,
    i64,
    String,
    Option<String>,
);

type ReactionRecord = (i64, i64, String, i64, i64, String, Option<String>);

/// The feed join: posts reachable through the viewer's edge, with author.
///
/// `?1` is the viewer, `?2` the optional author filter (NULL = any author).
const FEED_SQL: &str = r#"
    SELECT p.id, p.caption, p.image_url, p.frame, p.font, p.created_at_us,
           a.id, a.username, a.avatar
    FROM posts p
    JOIN post_viewers v ON v.post_id = p.id AND v.user_id = ?1
    JOIN users a ON a.id = p.author_id
    WHERE (?2 IS NULL OR p.author_id = ?2)
    ORDER BY p.created_at_us DESC, p.id DESC
"#;

/// Bind a [`FeedQuery`] onto the fixed feed join
fn feed_query(query: &FeedQuery) -> QueryAs<'static, Sqlite, FeedRecord, SqliteArguments<'static>> {
    sqlx::query_as::<_, FeedRecord>(FEED_SQL)
        .bind(query.viewer.0)
        .bind(query.author.map(|a| a.0))
}

/// Append `(id, id, ...)` for a non-empty post id list
fn push_post_ids(builder: &mut QueryBuilder<'_, Sqlite>, posts: &[PostId]) {
    builder.push("(");
    let mut ids = builder.separated(", ");
    for post in posts {
        ids.push_bind(post.0);
    }
    ids.push_unseparated(")");
}

fn feed_row(record: FeedRecord) -> Result<FeedRow, StoreError> {
    let (id, caption, image_url, frame, font, created_at_us, author_id, username, avatar) = record;
    Ok(FeedRow {
        id: PostId(id),
        caption,
        media_url: MediaRef(image_url),
        display: DisplayAttrs { frame, font },
        created_at: from_micros(created_at_us)?,
        author: UserProjection {
            id: UserId(author_id),
            username,
            avatar,
        },
    })
}

fn reaction_view(record: ReactionRecord) -> Result<ReactionView, StoreError> {
    let (id, post_id, kind, created_at_us, user_id, username, avatar) = record;
    Ok(ReactionView {
        id,
        post_id: PostId(post_id),
        kind: ReactionKind::parse(&kind).map_err(StoreError::Serialization)?,
        created_at: from_micros(created_at_us)?,
        reactor: UserProjection {
            id: UserId(user_id),
            username,
            avatar,
        },
    })
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn insert_post(&self, post: NewPost, viewers: &ViewerSet) -> Result<Post, StoreError> {
        if !viewers.contains(post.author_id) {
            return Err(StoreError::Constraint(format!(
                "author {} missing from viewer set",
                post.author_id
            )));
        }

        let created_at_us = to_micros(post.created_at);
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let id = sqlx::query(
            r#"
            INSERT INTO posts (author_id, caption, image_url, frame, font, created_at_us)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.author_id.0)
        .bind(&post.caption)
        .bind(post.media_url.as_str())
        .bind(&post.display.frame)
        .bind(&post.display.font)
        .bind(created_at_us)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?
        .last_insert_rowid();

        for viewer in viewers.iter() {
            sqlx::query("INSERT INTO post_viewers (post_id, user_id) VALUES (?, ?)")
                .bind(id)
                .bind(viewer.0)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        // Dropping `tx` on any error above rolls the post back
        tx.commit().await.map_err(store_err)?;

        Ok(Post {
            id: PostId(id),
            author_id: post.author_id,
            caption: post.caption,
            media_url: post.media_url,
            display: post.display,
            created_at: from_micros(created_at_us)?,
            viewers: viewers.clone(),
        })
    }

    async fn find_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        let row: Option<PostRecord> = sqlx::query_as(
            r#"
            SELECT id, author_id, caption, image_url, frame, font, created_at_us
            FROM posts
            WHERE id = ?
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        let Some((id, author_id, caption, image_url, frame, font, created_at_us)) = row else {
            return Ok(None);
        };

        let viewer_ids: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM post_viewers WHERE post_id = ? ORDER BY user_id")
                .bind(id)
                .fetch_all(&self.pool)
                .await
                .map_err(store_err)?;

        let author_id = UserId(author_id);
        let viewers = ViewerSet::from_stored(
            author_id,
            viewer_ids.into_iter().map(|(u,)| UserId(u)).collect(),
        )
        .ok_or_else(|| {
            StoreError::Constraint(format!("post {} has no viewer row for its author", id))
        })?;

        Ok(Some(Post {
            id: PostId(id),
            author_id,
            caption,
            media_url: MediaRef(image_url),
            display: DisplayAttrs { frame, font },
            created_at: from_micros(created_at_us)?,
            viewers,
        }))
    }

    async fn query_feed(&self, query: &FeedQuery) -> Result<Vec<FeedRow>, StoreError> {
        let records = feed_query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        records.into_iter().map(feed_row).collect()
    }

    async fn viewer_activity(
        &self,
        viewer: UserId,
        posts: &[PostId],
    ) -> Result<ViewerActivity, StoreError> {
        if posts.is_empty() {
            return Ok(ViewerActivity::default());
        }

        let mut count_rows: Vec<(i64, i64)> = Vec::new();
        let mut reaction_rows: Vec<ReactionRecord> = Vec::new();

        for chunk in posts.chunks(MAX_BOUND_IDS) {
            let mut counts = QueryBuilder::<Sqlite>::new(
                "SELECT post_id, COUNT(*) FROM comments WHERE author_id = ",
            );
            counts.push_bind(viewer.0);
            counts.push(" AND post_id IN ");
            push_post_ids(&mut counts, chunk);
            counts.push(" GROUP BY post_id");

            count_rows.extend(
                counts
                    .build_query_as::<(i64, i64)>()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(store_err)?,
            );

            let mut reactions = QueryBuilder::<Sqlite>::new(
                r#"
                SELECT r.id, r.post_id, r.kind, r.created_at_us, u.id, u.username, u.avatar
                FROM reactions r
                JOIN users u ON u.id = r.author_id
                WHERE r.author_id = "#,
            );
            reactions.push_bind(viewer.0);
            reactions.push(" AND r.post_id IN ");
            push_post_ids(&mut reactions, chunk);

            reaction_rows.extend(
                reactions
                    .build_query_as::<ReactionRecord>()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(store_err)?,
            );
        }

        // Chunks are fetched independently, so order the merged rows here
        reaction_rows.sort_by_key(|(id, _, _, created_at_us, ..)| Reverse((*created_at_us, *id)));

        tracing::debug!(
            viewer_id = %viewer,
            posts = posts.len(),
            commented = count_rows.len(),
            reactions = reaction_rows.len(),
            "Loaded viewer activity"
        );

        let mut comment_counts = BTreeMap::new();
        for (post, count) in count_rows {
            *comment_counts.entry(PostId(post)).or_insert(0) += count as u64;
        }

        Ok(ViewerActivity {
            comment_counts,
            reactions: reaction_rows
                .into_iter()
                .map(reaction_view)
                .collect::<Result<_, _>>()?,
        })
    }

    async fn is_viewer(&self, post: PostId, user: UserId) -> Result<bool, StoreError> {
        let (exists,): (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM post_viewers WHERE post_id = ? AND user_id = ?)",
        )
        .bind(post.0)
        .bind(user.0)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(exists != 0)
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, StoreError> {
        let created_at_us = to_micros(comment.created_at);
        let id = sqlx::query(
            "INSERT INTO comments (post_id, author_id, body, created_at_us) VALUES (?, ?, ?, ?)",
        )
        .bind(comment.post_id.0)
        .bind(comment.author_id.0)
        .bind(&comment.body)
        .bind(created_at_us)
        .execute(&self.pool)
        .await
        .map_err(store_err)?
        .last_insert_rowid();

        Ok(Comment {
            id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            body: comment.body,
            created_at: from_micros(created_at_us)?,
        })
    }

    async fn insert_reaction(&self, reaction: NewReaction) -> Result<Reaction, StoreError> {
        let created_at_us = to_micros(reaction.created_at);
        let id = sqlx::query(
            "INSERT INTO reactions (post_id, author_id, kind, created_at_us) VALUES (?, ?, ?, ?)",
        )
        .bind(reaction.post_id.0)
        .bind(reaction.author_id.0)
        .bind(reaction.kind.as_str())
        .bind(created_at_us)
        .execute(&self.pool)
        .await
        .map_err(store_err)?
        .last_insert_rowid();

        Ok(Reaction {
            id,
            post_id: reaction.post_id,
            author_id: reaction.author_id,
            kind: reaction.kind,
            created_at: from_micros(created_at_us)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circlefeed_domain::usecases::FeedQueryEngine;
    use std::sync::Arc;
    use time::{Duration, OffsetDateTime};

    async fn seeded() -> (SqliteStore, Vec<UserId>) {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut ids = vec![];
        for name in ["ana", "ben", "cai", "dee"] {
            let user = store
                .register_user(name, Some(&format!("https://cdn.example/{}.png", name)))
                .await
                .unwrap();
            ids.push(user.id);
        }
        (store, ids)
    }

    fn new_post(author: UserId, minutes: i64) -> NewPost {
        NewPost {
            author_id: author,
            caption: Some(format!("at {}", minutes)),
            media_url: MediaRef(format!("media/{}.jpg", minutes)),
            display: DisplayAttrs {
                frame: Some("film".to_string()),
                font: None,
            },
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_post() {
        let (store, users) = seeded().await;
        let viewers = ViewerSet::from_parts(users[0], &[users[1], users[2]]);
        let created = store
            .insert_post(new_post(users[0], 1), &viewers)
            .await
            .unwrap();

        let found = store.find_post(created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(found.viewers.contains(users[0]));
        assert_eq!(found.viewers.len(), 3);
        assert!(store.find_post(PostId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_post_is_atomic_on_unknown_viewer() {
        let (store, users) = seeded().await;
        let viewers = ViewerSet::from_parts(users[0], &[UserId(404)]);

        let result = store.insert_post(new_post(users[0], 1), &viewers).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));

        let (posts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(posts, 0);
    }

    #[tokio::test]
    async fn test_insert_post_requires_author_viewer() {
        let (store, users) = seeded().await;
        let viewers = ViewerSet::from_parts(users[1], &[]);
        let result = store.insert_post(new_post(users[0], 1), &viewers).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_feed_filters_by_viewer_and_author() {
        let (store, users) = seeded().await;
        let (ana, ben, cai, dee) = (users[0], users[1], users[2], users[3]);

        let p1 = store
            .insert_post(new_post(ana, 1), &ViewerSet::from_parts(ana, &[ben, cai]))
            .await
            .unwrap();
        let p2 = store
            .insert_post(new_post(cai, 2), &ViewerSet::from_parts(cai, &[ben]))
            .await
            .unwrap();

        let ben_feed = store.query_feed(&FeedQuery::new(ben, 0)).await.unwrap();
        let ids: Vec<PostId> = ben_feed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![p2.id, p1.id]);
        assert_eq!(ben_feed[0].author.username, "cai");

        let ben_from_ana = store
            .query_feed(&FeedQuery::new(ben, ana.0))
            .await
            .unwrap();
        assert_eq!(ben_from_ana.len(), 1);
        assert_eq!(ben_from_ana[0].id, p1.id);

        assert!(store.query_feed(&FeedQuery::new(dee, 0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feed_ties_break_by_id_descending() {
        let (store, users) = seeded().await;
        let ana = users[0];
        let viewers = ViewerSet::from_parts(ana, &[]);
        let first = store.insert_post(new_post(ana, 5), &viewers).await.unwrap();
        let second = store.insert_post(new_post(ana, 5), &viewers).await.unwrap();

        let feed = store.query_feed(&FeedQuery::new(ana, 0)).await.unwrap();
        let ids: Vec<PostId> = feed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_viewer_activity_is_scoped_to_viewer() {
        let (store, users) = seeded().await;
        let (ana, ben, cai) = (users[0], users[1], users[2]);
        let post = store
            .insert_post(new_post(ana, 1), &ViewerSet::from_parts(ana, &[ben, cai]))
            .await
            .unwrap();

        for (who, body) in [(ben, "one"), (ben, "two"), (cai, "three")] {
            store
                .insert_comment(NewComment {
                    post_id: post.id,
                    author_id: who,
                    body: body.to_string(),
                    created_at: OffsetDateTime::UNIX_EPOCH,
                })
                .await
                .unwrap();
        }
        for (who, kind, minutes) in [(ben, "like", 1), (cai, "wow", 2), (ben, "love", 3)] {
            store
                .insert_reaction(NewReaction {
                    post_id: post.id,
                    author_id: who,
                    kind: ReactionKind::parse(kind).unwrap(),
                    created_at: OffsetDateTime::UNIX_EPOCH + Duration::minutes(minutes),
                })
                .await
                .unwrap();
        }

        let ben_activity = store.viewer_activity(ben, &[post.id]).await.unwrap();
        assert_eq!(ben_activity.comment_counts.get(&post.id), Some(&2));
        let kinds: Vec<&str> = ben_activity.reactions.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["love", "like"]);
        assert!(ben_activity.reactions.iter().all(|r| r.reactor.username == "ben"));

        let ana_activity = store.viewer_activity(ana, &[post.id]).await.unwrap();
        assert!(ana_activity.comment_counts.is_empty());
        assert!(ana_activity.reactions.is_empty());

        let none = store.viewer_activity(ben, &[]).await.unwrap();
        assert!(none.reactions.is_empty());
    }

    #[tokio::test]
    async fn test_is_viewer() {
        let (store, users) = seeded().await;
        let post = store
            .insert_post(new_post(users[0], 1), &ViewerSet::from_parts(users[0], &[users[1]]))
            .await
            .unwrap();

        assert!(store.is_viewer(post.id, users[0]).await.unwrap());
        assert!(store.is_viewer(post.id, users[1]).await.unwrap());
        assert!(!store.is_viewer(post.id, users[2]).await.unwrap());
        assert!(!store.is_viewer(PostId(77), users[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_created_at_cannot_be_updated() {
        let (store, users) = seeded().await;
        let post = store
            .insert_post(new_post(users[0], 1), &ViewerSet::from_parts(users[0], &[]))
            .await
            .unwrap();

        let result = sqlx::query("UPDATE posts SET created_at_us = 0 WHERE id = ?")
            .bind(post.id.0)
            .execute(&store.pool)
            .await;
        assert!(result.is_err());

        let caption_update = sqlx::query("UPDATE posts SET caption = 'edited' WHERE id = ?")
            .bind(post.id.0)
            .execute(&store.pool)
            .await;
        assert!(caption_update.is_ok());
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_is_constraint_error() {
        let (store, users) = seeded().await;
        let result = store
            .insert_comment(NewComment {
                post_id: PostId(404),
                author_id: users[0],
                body: "hello".to_string(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            })
            .await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_feed_beyond_bind_limit_keeps_viewer_activity() {
        let (store, users) = seeded().await;
        let (ana, ben) = (users[0], users[1]);

        // More visible posts than SQLite accepts as bound parameters in one statement
        sqlx::query(
            r#"
            WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 33000)
            INSERT INTO posts (author_id, caption, image_url, created_at_us)
            SELECT ?, NULL, 'media/bulk.jpg', n FROM seq
            "#,
        )
        .bind(ben.0)
        .execute(&store.pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO post_viewers (post_id, user_id) SELECT id, author_id FROM posts",
        )
        .execute(&store.pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO post_viewers (post_id, user_id) SELECT id, ? FROM posts")
            .bind(ana.0)
            .execute(&store.pool)
            .await
            .unwrap();

        let oldest = PostId(1);
        store
            .insert_comment(NewComment {
                post_id: oldest,
                author_id: ana,
                body: "first".to_string(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            })
            .await
            .unwrap();
        store
            .insert_reaction(NewReaction {
                post_id: oldest,
                author_id: ana,
                kind: ReactionKind::parse("like").unwrap(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            })
            .await
            .unwrap();

        let feed = FeedQueryEngine::new(Arc::new(store));
        let views = feed.viewable_posts(FeedQuery::new(ana, 0)).await.unwrap();

        assert_eq!(views.len(), 33_000);
        let last = views.last().unwrap();
        assert_eq!(last.id, oldest);
        assert_eq!(last.comment_count, 1);
        assert_eq!(last.reactions.len(), 1);
        assert_eq!(last.reactions[0].reactor.id, ana);
        assert!(views[..views.len() - 1].iter().all(|v| v.comment_count == 0));
    }
}
