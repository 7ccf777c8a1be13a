//! Single-task download logic run by each pool worker.

use crate::error::{Error, Result};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::{AsyncWriteExt, BufWriter};

/// One queued download
#[derive(Clone, Debug)]
pub(super) struct DownloadTask {
    /// Remote asset URL
    pub url: String,
    /// Final on-disk location
    pub dest: PathBuf,
}

/// How a task ended when it did not fail
#[derive(Debug, PartialEq, Eq)]
pub(super) enum TaskOutcome {
    /// Fetched and written; carries the byte count
    Downloaded(u64),
    /// A file was already at the destination
    AlreadyPresent,
}

/// Resolve one task: skip if the file exists, otherwise fetch and stream it to disk
///
/// The body is written to a temp file unique to this task, next to `dest`, and
/// moved into place only after the last chunk. An interrupted download never
/// leaves a file at `dest` that a later run would mistake for a finished one,
/// and duplicate tasks for the same URL never share a temp file.
pub(super) async fn resolve(
    client: &reqwest::Client,
    task: &DownloadTask,
    chunk_size: usize,
) -> Result<TaskOutcome> {
    if tokio::fs::try_exists(&task.dest).await? {
        return Ok(TaskOutcome::AlreadyPresent);
    }

    let mut response = client.get(&task.url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Other(format!("HTTP {}", status.as_u16())));
    }

    // Dropping `partial` on any early return deletes the temp file
    let (file, partial) = partial_file(&task.dest)?;
    let written = stream_to_file(&mut response, file, chunk_size).await?;

    match partial.persist_noclobber(&task.dest) {
        Ok(()) => Ok(TaskOutcome::Downloaded(written)),
        // A duplicate task for the same URL got there first
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            Ok(TaskOutcome::AlreadyPresent)
        }
        Err(e) => Err(e.error.into()),
    }
}

async fn stream_to_file(
    response: &mut reqwest::Response,
    file: std::fs::File,
    chunk_size: usize,
) -> Result<u64> {
    let mut writer = BufWriter::with_capacity(chunk_size, tokio::fs::File::from_std(file));
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    writer.flush().await?;
    Ok(written)
}

/// Create `<name>.<random>.part` in the destination's directory
fn partial_file(dest: &Path) -> Result<(std::fs::File, TempPath)> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let prefix = dest
        .file_name()
        .map(|name| format!("{}.", name.to_string_lossy()))
        .unwrap_or_default();

    let partial = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(dir)?;
    Ok(partial.into_parts())
}
