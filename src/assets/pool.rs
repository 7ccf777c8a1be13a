//! Bounded download worker pool with a drain barrier.

use crate::config::AssetConfig;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::worker::{self, DownloadTask, TaskOutcome};
use super::{AssetSink, DrainReport, local_file_name};

/// State shared between the pool handle and its workers
#[derive(Default)]
struct PoolShared {
    /// Tasks submitted but not yet completed
    pending: AtomicUsize,
    /// Woken whenever `pending` drops to zero
    idle: Notify,
    downloaded: AtomicUsize,
    already_present: AtomicUsize,
    failed: AtomicUsize,
}

impl PoolShared {
    fn report(&self) -> DrainReport {
        DrainReport {
            downloaded: self.downloaded.load(Ordering::SeqCst),
            already_present: self.already_present.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Marks a task complete when dropped, whatever happened to it
///
/// Completion bookkeeping lives in `Drop` so that it runs exactly once per
/// task even if the download code panics.
struct Completion<'a>(&'a PoolShared);

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Fixed-size pool of download workers fed from one intake queue
///
/// Workers are spawned once in [`AssetPool::start`] and live until
/// [`AssetPool::drain_and_shutdown`], which every caller must invoke on every
/// exit path: dropping the pool without draining it abandons queued work.
pub struct AssetPool {
    intake: mpsc::UnboundedSender<DownloadTask>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<PoolShared>,
    asset_dir: PathBuf,
    asset_subdir: String,
}

impl AssetPool {
    /// Create the asset directory and spawn `config.workers` workers
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: &AssetConfig, user_agent: &str) -> Result<Self> {
        if config.workers == 0 {
            return Err(Error::config("assets.workers", "at least one worker is required"));
        }

        let asset_dir = config.asset_dir();
        tokio::fs::create_dir_all(&asset_dir).await?;

        let client = reqwest::Client::builder()
            .timeout(config.download_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        let (intake, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(PoolShared::default());

        let workers = (0..config.workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&receiver),
                    Arc::clone(&shared),
                    client.clone(),
                    config.chunk_size,
                ))
            })
            .collect();

        info!(
            workers = config.workers,
            dir = %asset_dir.display(),
            "Asset pool started"
        );

        Ok(Self {
            intake,
            workers,
            shared,
            asset_dir,
            asset_subdir: config.asset_subdir.clone(),
        })
    }

    /// Queue a URL for download without waiting for it
    ///
    /// # Errors
    /// Returns [`Error::ShuttingDown`] if every worker has exited, and
    /// [`Error::Other`] if no file name can be derived from the URL.
    pub fn submit(&self, url: &str) -> Result<()> {
        let name = local_file_name(url)
            .ok_or_else(|| Error::Other(format!("No file name in asset URL '{}'", url)))?;

        let task = DownloadTask {
            url: url.to_string(),
            dest: self.asset_dir.join(name),
        };

        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if self.intake.send(task).is_err() {
            // Nothing will ever pick this task up; undo its bookkeeping
            drop(Completion(&self.shared));
            return Err(Error::ShuttingDown);
        }

        Ok(())
    }

    /// Number of submitted tasks that have not completed yet
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Directory files are written to
    pub fn asset_dir(&self) -> &std::path::Path {
        &self.asset_dir
    }

    /// Wait until every task submitted so far has completed, keeping the pool open
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Close the intake, let workers finish everything queued, and stop them
    ///
    /// When this returns, every task submitted before the call has a terminal
    /// outcome: its file exists, or it failed and was logged.
    pub async fn drain_and_shutdown(self) -> DrainReport {
        let Self {
            intake,
            workers,
            shared,
            ..
        } = self;

        info!(
            pending = shared.pending.load(Ordering::SeqCst),
            "Waiting for asset queue to drain"
        );

        // Workers exit once the closed channel has been emptied
        drop(intake);
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Asset worker terminated abnormally");
            }
        }

        let report = shared.report();
        info!(
            downloaded = report.downloaded,
            already_present = report.already_present,
            failed = report.failed,
            "Asset queue drained; pool shut down"
        );
        report
    }
}

impl AssetSink for AssetPool {
    fn rewrite_and_enqueue(&self, url: &str) -> Option<String> {
        let name = match local_file_name(url) {
            Some(name) => name,
            None => {
                warn!(url = %url, "Cannot derive a local file name; keeping remote URL");
                return None;
            }
        };

        match self.submit(url) {
            Ok(()) => {
                let local = format!("{}/{}", self.asset_subdir, name);
                debug!(url = %url, local = %local, "Rewrote asset URL");
                Some(local)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to queue asset; keeping remote URL");
                None
            }
        }
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<DownloadTask>>>,
    shared: Arc<PoolShared>,
    client: reqwest::Client,
    chunk_size: usize,
) {
    loop {
        // The lock is only held while waiting for the next task
        let next = receiver.lock().await.recv().await;
        let Some(task) = next else {
            debug!(worker = id, "Intake closed; worker exiting");
            break;
        };

        let _completion = Completion(&shared);

        match worker::resolve(&client, &task, chunk_size).await {
            Ok(TaskOutcome::Downloaded(bytes)) => {
                debug!(worker = id, url = %task.url, bytes, "Downloaded asset");
                shared.downloaded.fetch_add(1, Ordering::SeqCst);
            }
            Ok(TaskOutcome::AlreadyPresent) => {
                debug!(
                    worker = id,
                    url = %task.url,
                    path = %task.dest.display(),
                    "Asset already present; skipping"
                );
                shared.already_present.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                warn!(worker = id, url = %task.url, error = %e, "Asset download failed");
                shared.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}
