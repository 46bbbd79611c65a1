// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The node abstraction (C6): a uniform interface over a machine fleet,
//! whether it lives in this process ([`LocalNode`]) or behind an HTTP API
//! on another host ([`RemoteNode`]).
//!
//! Grounded on `original_source/common/cuckoo/common/node.py`'s `NodeInfo`/
//! `NodeInfos` (capability tracking, platform/route matching) and its
//! `ExistingResultServer`. That class's `__eq__` is a double bug in the
//! original — `(self.listen_ip, self.listen_port) != (other.listen_ip,
//! other.port)` inverts the comparison operator *and* reads a nonexistent
//! `other.port` instead of `other.listen_port` — so two equal endpoints
//! never compared equal and two different ones always did.
//! [`ResultServerEndpoint`]'s `PartialEq` fixes both.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::BufReader;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use warden_core::{Machine, Task, TaskId};

use crate::error::{AdaptersError, AdaptersResult};
use crate::machinery::MachineryManager;
use crate::machinery::MachineDriver;
use warden_storage::TaskQueue;

/// One result server socket a node's agents report sampled traffic back to.
/// Equality (and therefore dedup/lookup) is by `(listen_ip, listen_port)`
/// only — `socket_path` may legitimately differ between otherwise-identical
/// endpoints reached through different mounts.
#[derive(Debug, Clone)]
pub struct ResultServerEndpoint {
    pub socket_path: PathBuf,
    pub listen_ip: String,
    pub listen_port: u16,
}

impl ResultServerEndpoint {
    pub fn new(socket_path: impl Into<PathBuf>, listen_ip: impl Into<String>, listen_port: u16) -> Self {
        ResultServerEndpoint { socket_path: socket_path.into(), listen_ip: listen_ip.into(), listen_port }
    }
}

impl PartialEq for ResultServerEndpoint {
    fn eq(&self, other: &Self) -> bool {
        (&self.listen_ip, self.listen_port) == (&other.listen_ip, other.listen_port)
    }
}
impl Eq for ResultServerEndpoint {}

impl std::hash::Hash for ResultServerEndpoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.listen_ip.hash(state);
        self.listen_port.hash(state);
    }
}

impl std::fmt::Display for ResultServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.listen_ip, self.listen_port)
    }
}

/// Uniform interface the scheduler (C8) drives regardless of where a node's
/// machines actually live.
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &str;
    async fn machines(&self) -> AdaptersResult<Vec<Machine>>;
    async fn ready(&self) -> bool;
    /// Locks and returns one of this node's machines matching the given
    /// constraints, or `None` if nothing is currently available. Mirrors
    /// `NodesTracker.find_available`'s per-node `machines.acquire_available`
    /// call, generalized over the local/remote split.
    async fn acquire_machine(
        &self,
        task_id: &TaskId,
        name: Option<&str>,
        platform: Option<&str>,
        os_version: Option<&str>,
        tags: &BTreeSet<String>,
    ) -> AdaptersResult<Option<Machine>>;
    async fn release_machine(&self, machine_name: &str) -> AdaptersResult<()>;
    async fn add_task(&self, task: Task) -> AdaptersResult<()>;
    async fn task_failed(&self, task_id: &TaskId, reason: &str) -> AdaptersResult<()>;
}

/// A node whose machines and task queue live in this process.
pub struct LocalNode<D: MachineDriver> {
    name: String,
    machinery: MachineryManager<D>,
    queue: TaskQueue,
}

impl<D: MachineDriver> LocalNode<D> {
    pub fn new(name: impl Into<String>, machinery: MachineryManager<D>, queue: TaskQueue) -> Self {
        LocalNode { name: name.into(), machinery, queue }
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn machinery(&self) -> &MachineryManager<D> {
        &self.machinery
    }
}

#[async_trait]
impl<D: MachineDriver + 'static> Node for LocalNode<D> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn machines(&self) -> AdaptersResult<Vec<Machine>> {
        Ok(self.machinery.all_machines())
    }

    async fn ready(&self) -> bool {
        self.machinery.all_machines().iter().any(Machine::is_available)
    }

    async fn acquire_machine(
        &self,
        task_id: &TaskId,
        name: Option<&str>,
        platform: Option<&str>,
        os_version: Option<&str>,
        tags: &std::collections::BTreeSet<String>,
    ) -> AdaptersResult<Option<Machine>> {
        Ok(self.machinery.acquire_available(task_id.clone(), name, platform, os_version, tags))
    }

    async fn release_machine(&self, machine_name: &str) -> AdaptersResult<()> {
        self.machinery.release(machine_name)
    }

    async fn add_task(&self, task: Task) -> AdaptersResult<()> {
        self.queue.push(task);
        Ok(())
    }

    async fn task_failed(&self, task_id: &TaskId, reason: &str) -> AdaptersResult<()> {
        warn!(%task_id, reason, node = %self.name, "local task failed");
        Ok(())
    }
}

/// A node reached over HTTP — another host running its own daemon exposing
/// the same machines/tasks surface.
pub struct RemoteNode {
    name: String,
    base_url: reqwest::Url,
    client: reqwest::Client,
}

impl RemoteNode {
    pub fn new(name: impl Into<String>, base_url: reqwest::Url) -> Self {
        RemoteNode { name: name.into(), base_url, client: reqwest::Client::new() }
    }

    fn url(&self, path: &str) -> AdaptersResult<reqwest::Url> {
        self.base_url.join(path).map_err(|e| AdaptersError::NodeNotReady(format!("invalid node URL {path:?}: {e}")))
    }
}

#[async_trait]
impl Node for RemoteNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn machines(&self) -> AdaptersResult<Vec<Machine>> {
        let resp = self.client.get(self.url("machines")?).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn ready(&self) -> bool {
        let Ok(url) = self.url("ready") else { return false };
        self.client.get(url).send().await.map(|r| r.status().is_success()).unwrap_or(false)
    }

    async fn acquire_machine(
        &self,
        task_id: &TaskId,
        name: Option<&str>,
        platform: Option<&str>,
        os_version: Option<&str>,
        tags: &BTreeSet<String>,
    ) -> AdaptersResult<Option<Machine>> {
        let resp = self
            .client
            .post(self.url("machines/acquire")?)
            .json(&serde_json::json!({
                "task_id": task_id.as_str(),
                "name": name,
                "platform": platform,
                "os_version": os_version,
                "tags": tags,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn release_machine(&self, machine_name: &str) -> AdaptersResult<()> {
        let path = format!("machines/{machine_name}/release");
        self.client.post(self.url(&path)?).send().await?.error_for_status()?;
        Ok(())
    }

    async fn add_task(&self, task: Task) -> AdaptersResult<()> {
        self.client.post(self.url("tasks")?).json(&task).send().await?.error_for_status()?;
        Ok(())
    }

    async fn task_failed(&self, task_id: &TaskId, reason: &str) -> AdaptersResult<()> {
        let path = format!("tasks/{}/failed", task_id.as_str());
        self.client
            .post(self.url(&path)?)
            .json(&serde_json::json!({ "reason": reason }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Reconnecting reader for a remote node's event stream (chunked-transfer
/// newline-delimited JSON), mirroring `warden_wire::EventStreamReader`'s
/// shape but over HTTP instead of a Unix socket.
pub struct HttpEventStreamReader {
    url: reqwest::Url,
    client: reqwest::Client,
    backoff: Duration,
}

impl HttpEventStreamReader {
    pub fn new(client: reqwest::Client, url: reqwest::Url) -> Self {
        HttpEventStreamReader { url, client, backoff: Duration::from_secs(10) }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Calls `on_event` for every event received until `cancel` fires.
    /// Reconnects (after `backoff`) on any read error or clean disconnect.
    pub async fn run<Ev, F>(self, cancel: CancellationToken, mut on_event: F)
    where
        Ev: serde::de::DeserializeOwned,
        F: FnMut(Ev),
    {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            match self.client.get(self.url.clone()).send().await {
                Ok(resp) => {
                    let byte_stream = resp.bytes_stream().map(|r| r.map_err(std::io::Error::other));
                    let mut reader = BufReader::new(StreamReader::new(byte_stream));
                    loop {
                        let next = tokio::select! {
                            _ = cancel.cancelled() => return,
                            msg = warden_wire::read_json_message::<Ev>(&mut reader) => msg,
                        };
                        match next {
                            Ok(Some(event)) => on_event(event),
                            Ok(None) => break,
                            Err(e) => {
                                warn!(error = %e, "node event stream read failed, reconnecting");
                                break;
                            }
                        }
                    }
                }
                Err(e) => debug!(error = %e, "node event stream connect failed, reconnecting"),
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
