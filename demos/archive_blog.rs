//! Archive a blog into ./scrape.sqlite and ./posts/images
//!
//! ```bash
//! cargo run --example archive_blog -- staff.tumblr.com 100
//! ```
//!
//! Reads the consumer key from `./secret_key` (`{"consumer_key": "..."}`).
//! Set `RUST_LOG=blog_archive=debug` for per-post and per-asset logging.

use blog_archive::{Archiver, Config, StopReason};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let blog = args
        .next()
        .ok_or("usage: archive_blog <blog identifier> [limit]")?;
    let limit = args.next().map(|n| n.parse::<usize>()).transpose()?;

    let mut config = Config::default();
    config.api.load_key_file(Path::new("secret_key"))?;

    let archiver = Archiver::from_config(config).await?;
    let summary = archiver.run(&blog, limit).await?;

    println!(
        "Stored {} new posts ({} already present); assets: {} downloaded, {} present, {} failed",
        summary.ingest.processed,
        summary.ingest.skipped,
        summary.assets.downloaded,
        summary.assets.already_present,
        summary.assets.failed
    );
    if let StopReason::FetchFailed(e) = &summary.ingest.stopped {
        eprintln!("Stopped early: {e}");
    }

    Ok(())
}
