//! Media asset materialization.
//!
//! [`AssetPool`] owns a fixed set of download workers sharing one intake
//! queue. Producers hand it remote URLs through [`AssetSink`] and immediately
//! get back the relative path the file will live at; the file is only
//! guaranteed to be resolved once [`AssetPool::drain_and_shutdown`] returns.

mod pool;
mod worker;

pub use pool::AssetPool;

/// Consumer side of the asset pipeline, as seen by the post transformer
pub trait AssetSink: Send + Sync {
    /// Schedule `url` for download and return the local path it will be
    /// written to, relative to the output directory.
    ///
    /// Returns `None` when the URL cannot be localized (no file name can be
    /// derived, or the pool no longer accepts work); callers keep the remote
    /// URL in that case.
    fn rewrite_and_enqueue(&self, url: &str) -> Option<String>;
}

/// Tally of how every submitted download ended
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Files fetched and written during this run
    pub downloaded: usize,
    /// Tasks satisfied by a file already on disk
    pub already_present: usize,
    /// Tasks that ended without a file (logged, not retried)
    pub failed: usize,
}

impl DrainReport {
    /// Total number of tasks that reached a terminal outcome
    pub fn total(&self) -> usize {
        self.downloaded + self.already_present + self.failed
    }
}

/// Derive the local file name for a remote URL: its last non-empty path segment
///
/// Query strings and fragments are ignored. Two different URLs ending in the
/// same segment map to the same file.
pub fn local_file_name(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()
        .map(str::to_string)
}
