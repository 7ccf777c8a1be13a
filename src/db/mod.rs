//! Database layer for blog-archive
//!
//! Handles SQLite persistence for blog metadata and normalized posts.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`posts`]: Post existence checks, inserts, and streaming reads
//! - [`metadata`]: Blog metadata upsert and lookup

use crate::error::{DatabaseError, Error};
use crate::types::{Aux, NormalizedPost, PostId};
use sqlx::{FromRow, sqlite::SqlitePool};

mod metadata;
mod migrations;
mod posts;

/// Post record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    /// Feed-assigned post id
    pub id: i64,
    /// Post type string
    #[sqlx(rename = "type")]
    pub post_type: String,
    /// Unix timestamp of publication
    pub time: i64,
    /// Human-readable publication date
    pub date: String,
    /// Comma-joined tags
    pub tags: String,
    /// Attribution URL
    pub source_url: Option<String>,
    /// Attribution title
    pub source_title: Option<String>,
    /// Publication state
    pub state: String,
    /// JSON-encoded [`Aux`], absent for unrecognized post types
    pub aux_info: Option<String>,
}

impl TryFrom<PostRow> for NormalizedPost {
    type Error = Error;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let aux = match row.aux_info.as_deref() {
            Some(json) => Some(serde_json::from_str::<Aux>(json).map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to decode aux payload of post {}: {}",
                    row.id, e
                )))
            })?),
            None => None,
        };

        Ok(NormalizedPost {
            id: PostId(row.id),
            post_type: row.post_type,
            timestamp: row.time,
            date: row.date,
            tags: row.tags,
            source_url: row.source_url,
            source_title: row.source_title,
            state: row.state,
            aux,
        })
    }
}

/// Metadata record from database
#[derive(Debug, Clone, FromRow)]
pub struct MetadataRow {
    /// Blog URL
    pub url: String,
    /// Blog title
    pub title: String,
    /// Unix timestamp of the blog's last update
    pub last_update: i64,
}

/// Database handle for blog-archive
pub struct Database {
    pool: SqlitePool,
}
