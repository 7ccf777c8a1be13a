//! Paginated ingestion and whole-run orchestration.
//!
//! [`Archiver::ingest`] walks a blog's feed page by page, skipping posts the
//! store already holds, and persists the rest in feed order.
//! [`Archiver::run`] wraps it with an [`AssetPool`] and always drains the pool
//! before returning, so callers can read asset files afterwards.

use crate::assets::{AssetPool, AssetSink, DrainReport};
use crate::client::{FeedClient, TumblrClient};
use crate::config::{Config, PAGE_SIZE};
use crate::db::Database;
use crate::error::{FetchError, Result};
use crate::transform::transform;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why the ingestion loop stopped
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The feed returned an empty or short page
    Exhausted,
    /// The requested number of new posts was stored
    LimitReached,
    /// A page request failed; everything stored before it is kept
    FetchFailed(FetchError),
}

/// Result of one pass of the ingestion loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestOutcome {
    /// New posts stored during this pass
    pub processed: usize,
    /// Posts skipped because the store already held them
    pub skipped: usize,
    /// Page requests issued, including a failed one
    pub pages: usize,
    /// Whether blog metadata was fetched and stored
    pub metadata_refreshed: bool,
    /// Why the loop ended
    pub stopped: StopReason,
}

/// Everything a finished run reports
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Ingestion results
    pub ingest: IngestOutcome,
    /// Asset download results
    pub assets: DrainReport,
}

/// Drives ingestion of one or more blogs into a store
pub struct Archiver {
    db: Arc<Database>,
    client: Arc<dyn FeedClient>,
    config: Config,
}

impl Archiver {
    /// Create an archiver from its collaborators
    pub fn new(db: Arc<Database>, client: Arc<dyn FeedClient>, config: Config) -> Self {
        Self { db, client, config }
    }

    /// Validate the config, open the database, and connect to the Tumblr API
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;
        let client = TumblrClient::new(&config.api)?;
        Ok(Self::new(Arc::new(db), Arc::new(client), config))
    }

    /// The record store this archiver writes to
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Ingest a blog and wait for all of its assets
    ///
    /// The asset pool is drained on every path out of this method, including
    /// a store error during ingestion, which is returned after draining.
    pub async fn run(&self, blog: &str, limit: Option<usize>) -> Result<RunSummary> {
        let pool = AssetPool::start(&self.config.assets, &self.config.api.user_agent).await?;

        let ingest = self.ingest(blog, limit, &pool).await;
        let assets = pool.drain_and_shutdown().await;

        let ingest = ingest?;
        info!(
            blog = %blog,
            processed = ingest.processed,
            downloaded = assets.downloaded,
            failed_assets = assets.failed,
            "Run complete"
        );
        Ok(RunSummary { ingest, assets })
    }

    /// Store blog metadata, then pull pages until the feed is exhausted,
    /// `limit` new posts have been stored, or a page request fails
    ///
    /// Page fetch failures end the loop and are reported in
    /// [`IngestOutcome::stopped`]; only store failures return `Err`.
    pub async fn ingest(
        &self,
        blog: &str,
        limit: Option<usize>,
        assets: &dyn AssetSink,
    ) -> Result<IngestOutcome> {
        let mut outcome = IngestOutcome {
            processed: 0,
            skipped: 0,
            pages: 0,
            metadata_refreshed: self.refresh_metadata(blog).await,
            stopped: StopReason::Exhausted,
        };

        if limit == Some(0) {
            outcome.stopped = StopReason::LimitReached;
            return Ok(outcome);
        }

        let mut offset: u32 = 0;
        loop {
            outcome.pages += 1;
            let page = match self.client.fetch_page(blog, offset, PAGE_SIZE).await {
                Ok(page) => page,
                Err(e) => {
                    error!(blog = %blog, offset, error = %e, "Failed to get posts; stopping");
                    outcome.stopped = StopReason::FetchFailed(e);
                    return Ok(outcome);
                }
            };

            if page.posts.is_empty() {
                info!(blog = %blog, offset, "No more posts");
                return Ok(outcome);
            }
            let short_page = page.posts.len() < PAGE_SIZE as usize;

            for raw in page.posts {
                // The feed re-indexes under concurrent posting, so ids from an
                // earlier page can show up again at a later offset
                if self.db.post_exists(raw.id).await? {
                    debug!(post = %raw.id, "Already stored; skipping");
                    outcome.skipped += 1;
                    continue;
                }

                let post = transform(raw, assets);
                self.db.insert_post(&post).await?;
                outcome.processed += 1;
                debug!(post = %post.id, post_type = %post.post_type, "Stored post");

                if limit.is_some_and(|limit| outcome.processed >= limit) {
                    info!(blog = %blog, processed = outcome.processed, "Post limit reached");
                    outcome.stopped = StopReason::LimitReached;
                    return Ok(outcome);
                }
            }

            if short_page {
                info!(blog = %blog, offset, "Reached the end of the feed");
                return Ok(outcome);
            }
            offset += PAGE_SIZE;
        }
    }

    /// Fetch and store blog metadata; failures are logged and reported as `false`
    async fn refresh_metadata(&self, blog: &str) -> bool {
        let meta = match self.client.fetch_metadata(blog).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(blog = %blog, error = %e, "Failed to fetch blog metadata; continuing");
                return false;
            }
        };

        match self
            .db
            .upsert_metadata(&meta.url, &meta.title, meta.last_update)
            .await
        {
            Ok(()) => {
                info!(blog = %blog, title = %meta.title, "Stored blog metadata");
                true
            }
            Err(e) => {
                warn!(blog = %blog, error = %e, "Failed to store blog metadata; continuing");
                false
            }
        }
    }
}
