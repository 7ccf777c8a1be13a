//! Blog metadata upsert and lookup.

use crate::error::DatabaseError;
use crate::types::BlogMetadata;
use crate::{Error, Result};

use super::{Database, MetadataRow};

impl Database {
    /// Insert or refresh the metadata row for a blog
    pub async fn upsert_metadata(&self, url: &str, title: &str, last_update: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (url, title, last_update)
            VALUES (?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET title = excluded.title, last_update = excluded.last_update
            "#,
        )
        .bind(url)
        .bind(title)
        .bind(last_update)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to store metadata for {}: {}",
                url, e
            )))
        })?;

        Ok(())
    }

    /// Metadata of the most recently updated blog in the store
    pub async fn get_metadata(&self) -> Result<Option<BlogMetadata>> {
        let row = sqlx::query_as::<_, MetadataRow>(
            r#"
            SELECT url, title, last_update
            FROM metadata
            ORDER BY last_update DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get metadata: {}",
                e
            )))
        })?;

        Ok(row.map(|row| BlogMetadata {
            url: row.url,
            title: row.title,
            last_update: row.last_update,
        }))
    }
}
