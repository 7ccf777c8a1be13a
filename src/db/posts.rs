//! Post persistence: existence checks, inserts, and streaming reads.

use crate::error::DatabaseError;
use crate::types::{NormalizedPost, PostId};
use crate::{Error, Result};
use futures::stream::{BoxStream, StreamExt};

use super::{Database, PostRow};

impl Database {
    /// Check whether a post with this id has already been stored
    ///
    /// This is the ingestion loop's dedup guard. It reads durable state so it
    /// stays correct across runs and process restarts.
    pub async fn post_exists(&self, id: PostId) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to check post {}: {}",
                    id, e
                )))
            })?;

        Ok(exists != 0)
    }

    /// Store a normalized post
    ///
    /// Posts are never overwritten: inserting an id that already exists fails
    /// with [`DatabaseError::ConstraintViolation`].
    pub async fn insert_post(&self, post: &NormalizedPost) -> Result<()> {
        let aux_info = post.aux.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, type, time, date, tags, source_url, source_title, state, aux_info)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.id)
        .bind(&post.post_type)
        .bind(post.timestamp)
        .bind(&post.date)
        .bind(&post.tags)
        .bind(&post.source_url)
        .bind(&post.source_title)
        .bind(&post.state)
        .bind(aux_info)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "Post {} is already stored",
                    post.id
                )))
            }
            other => Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert post {}: {}",
                post.id, other
            ))),
        })?;

        Ok(())
    }

    /// Get a stored post by id
    pub async fn get_post(&self, id: PostId) -> Result<Option<NormalizedPost>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, type, time, date, tags, source_url, source_title, state, aux_info
            FROM posts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get post {}: {}",
                id, e
            )))
        })?;

        row.map(NormalizedPost::try_from).transpose()
    }

    /// Number of stored posts
    pub async fn count_posts(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count posts: {}",
                    e
                )))
            })?;

        Ok(count)
    }

    /// Stream every stored post, newest first
    ///
    /// Rows are decoded lazily as the stream is polled. Each call runs a fresh
    /// query, so the sequence can be restarted by calling this again.
    pub fn all_posts(&self) -> BoxStream<'_, Result<NormalizedPost>> {
        sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, type, time, date, tags, source_url, source_title, state, aux_info
            FROM posts
            ORDER BY time DESC, id DESC
            "#,
        )
        .fetch(&self.pool)
        .map(|row| {
            let row = row.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read post row: {}",
                    e
                )))
            })?;
            NormalizedPost::try_from(row)
        })
        .boxed()
    }
}
