// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`SocketResultServerHandle`]: the task runner's client view of
//! `resultserver.sock`.
//!
//! `warden_engine::taskrunner::ResultServerHandle` only describes what the
//! task runner needs (`add`/`remove`); the actual result server — the
//! process that accepts sampled guest traffic on a per-task listening port
//! — is a separate component reached over that socket, the same way
//! `original_source/core/cuckoo/resultserver.py`'s `ResultServer` is driven
//! by IPC rather than an in-process call from the task runner.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use warden_core::TaskId;
use warden_engine::taskrunner::{ResultServerHandle, TaskRunError};
use warden_wire::{ResultServerRequest, ResultServerResponse, UnixSockClient};

const CONNECT_RETRIES: u32 = 5;
const CONNECT_DELAY: Duration = Duration::from_millis(200);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SocketResultServerHandle {
    path: PathBuf,
    client: Mutex<Option<UnixSockClient>>,
}

impl SocketResultServerHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SocketResultServerHandle { path: path.into(), client: Mutex::new(None) }
    }

    async fn request(&self, req: &ResultServerRequest) -> Result<ResultServerResponse, TaskRunError> {
        let mut guard = self.client.lock().await;
        if guard.is_none() {
            let connected = UnixSockClient::connect(&self.path, CONNECT_RETRIES, CONNECT_DELAY)
                .await
                .map_err(|e| TaskRunError::AgentTimeout(format!("resultserver.sock unreachable: {e}")))?;
            *guard = Some(connected);
        }
        let Some(client) = guard.as_mut() else {
            unreachable!("connection established above")
        };
        match client.request(req, Some(REQUEST_TIMEOUT)).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                // drop the stale connection so the next call reconnects
                *guard = None;
                Err(TaskRunError::AgentTimeout(format!("resultserver.sock request failed: {e}")))
            }
        }
    }
}

#[async_trait]
impl ResultServerHandle for SocketResultServerHandle {
    async fn add(&self, ip: &str, task_id: &TaskId) -> Result<(), TaskRunError> {
        let resp = self.request(&ResultServerRequest::Add { ip: ip.to_string(), task_id: task_id.as_str().to_string() }).await?;
        if resp.status == "ok" {
            Ok(())
        } else {
            Err(TaskRunError::AgentTimeout(resp.reason.unwrap_or_else(|| "resultserver rejected add".into())))
        }
    }

    async fn remove(&self, ip: &str, task_id: &TaskId) {
        let _ = self.request(&ResultServerRequest::Remove { ip: ip.to_string(), task_id: task_id.as_str().to_string() }).await;
    }
}

#[cfg(test)]
#[path = "result_server_client_tests.rs"]
mod tests;
