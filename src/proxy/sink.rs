//! Incremental output of working proxies

use crate::proxy::models::ClassificationResult;
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only result file, truncated when created.
///
/// Each accepted line is written and flushed before `write` returns, so an
/// interrupted run keeps everything reported so far. Writers are serialized
/// by an internal lock; lines never interleave.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl ResultSink {
    /// Create or truncate the destination
    pub async fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `result` if it succeeded. Returns whether a line was written.
    pub async fn write(&self, result: &ClassificationResult) -> Result<bool> {
        let Some(line) = result.output_line() else {
            return Ok(false);
        };

        let mut file = self.file.lock().await;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(true)
    }
}
