//! # blog-archive
//!
//! Pulls a blog's posts from a paginated feed API, normalizes them into a
//! SQLite store, and downloads every image they reference so the blog can be
//! rendered offline.
//!
//! ## Pipeline
//!
//! - [`ingest::Archiver`] walks the feed page by page and skips posts the
//!   store already holds
//! - [`transform`] normalizes each new post and rewrites media URLs to local paths
//! - [`assets::AssetPool`] downloads those media files on a fixed pool of workers
//! - [`db::Database`] persists posts and blog metadata
//!
//! Asset files are only guaranteed to exist once the pool has been drained;
//! [`Archiver::run`] does that before returning.
//!
//! ## Quick Start
//!
//! ```no_run
//! use blog_archive::{Archiver, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.api.api_key = Some("consumer-key".to_string());
//!
//!     let archiver = Archiver::from_config(config).await?;
//!     let summary = archiver.run("staff.tumblr.com", Some(100)).await?;
//!     println!("stored {} new posts", summary.ingest.processed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Media asset download pool
pub mod assets;
/// Feed API client
pub mod client;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Paginated ingestion and run orchestration
pub mod ingest;
/// Post normalization
pub mod transform;
/// Core types
pub mod types;

// Re-export commonly used types
pub use assets::{AssetPool, AssetSink, DrainReport};
pub use client::{FeedClient, TumblrClient};
pub use config::{Config, PAGE_SIZE};
pub use db::Database;
pub use error::{DatabaseError, Error, FetchError, Result};
pub use ingest::{Archiver, IngestOutcome, RunSummary, StopReason};
pub use types::{Aux, BlogMetadata, NormalizedPost, PostId, PostType, RawPost};
