// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The result retriever (C7): a small fixed-size worker pool that downloads
//! a remote task's result bundle, unpacks it into the local analysis
//! directory, and deletes the zip: download, unpack, delete zip, reply
//! success/failure, triggered by a remote node's `TASK_DONE`/`TASK_FAILED`
//! events.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use warden_core::TaskId;

use crate::error::AdaptersError;

pub const DEFAULT_WORKER_COUNT: usize = 4;

pub struct RetrievalJob {
    pub task_id: TaskId,
    pub zip_url: reqwest::Url,
    pub dest_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    Ok,
    Failed(String),
}

struct Job {
    job: RetrievalJob,
    reply: oneshot::Sender<RetrievalOutcome>,
}

/// Downloads `zip_url`, extracts every entry under `dest_dir`, then removes
/// the downloaded archive. Runs the (synchronous) zip-extraction on a
/// blocking thread so it doesn't stall the worker's async executor.
async fn retrieve_one(client: &reqwest::Client, job: &RetrievalJob) -> Result<(), AdaptersError> {
    let bytes = client.get(job.zip_url.clone()).send().await?.error_for_status()?.bytes().await?;

    std::fs::create_dir_all(&job.dest_dir)?;
    let tmp_zip = job.dest_dir.join(format!(".{}.result.zip", job.task_id.as_str()));
    {
        let mut f = std::fs::File::create(&tmp_zip)?;
        f.write_all(&bytes)?;
    }

    let dest_dir = job.dest_dir.clone();
    let zip_path = tmp_zip.clone();
    tokio::task::spawn_blocking(move || unpack(&zip_path, &dest_dir))
        .await
        .map_err(|e| AdaptersError::TaskPanicked(e.to_string()))??;

    std::fs::remove_file(&tmp_zip)?;
    Ok(())
}

fn unpack(zip_path: &Path, dest_dir: &Path) -> Result<(), AdaptersError> {
    let file = std::fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else { continue };
        let out_path = dest_dir.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

/// The N=4-worker pool draining the retrieval queue.
pub struct ResultRetriever {
    tx: mpsc::Sender<Job>,
    cancel: CancellationToken,
}

impl ResultRetriever {
    pub fn spawn(worker_count: usize, client: reqwest::Client) -> Self {
        let (tx, rx) = mpsc::channel(worker_count.max(1) * 4);
        let rx = Arc::new(AsyncMutex::new(rx));
        let cancel = CancellationToken::new();

        for worker_id in 0..worker_count.max(1) {
            let rx = rx.clone();
            let client = client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tracing::debug!(worker_id, "result retriever worker started");
                loop {
                    let item = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => None,
                            item = rx.recv() => item,
                        }
                    };
                    let Some(Job { job, reply }) = item else { break };
                    let task_id = job.task_id.clone();
                    let outcome = match retrieve_one(&client, &job).await {
                        Ok(()) => RetrievalOutcome::Ok,
                        Err(e) => {
                            tracing::warn!(%task_id, error = %e, "result retrieval failed");
                            RetrievalOutcome::Failed(e.to_string())
                        }
                    };
                    let _ = reply.send(outcome);
                }
            });
        }

        ResultRetriever { tx, cancel }
    }

    pub async fn submit(&self, job: RetrievalJob) -> RetrievalOutcome {
        if self.cancel.is_cancelled() {
            return RetrievalOutcome::Failed("result retriever is shut down".into());
        }
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Job { job, reply }).await.is_err() {
            return RetrievalOutcome::Failed("result retriever is shut down".into());
        }
        rx.await.unwrap_or(RetrievalOutcome::Failed("retrieval worker dropped its reply".into()))
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "retriever_tests.rs"]
mod tests;
