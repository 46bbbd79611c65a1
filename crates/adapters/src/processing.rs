// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The processing worker pool (C4): per-stage plugin fleets driven by a
//! small pool of async workers.
//!
//! Grounded on `original_source/processing/cuckoo/processing/worker.py`'s
//! `make_plugin_instances`/`_run_processing_instances`/`_handle_processing`:
//! plugins are filtered by category, sorted by `order`, and run in sequence;
//! a plugin raising `CancelProcessing` aborts the stage without failing the
//! worker itself, while any other plugin exception is a hard failure. That
//! exception-based control flow is redesigned here into the plain
//! [`PluginOutcome`] result type every plugin returns instead of throwing.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use warden_core::{AnalysisId, ProcessingResult};

/// Which stage a plugin fleet runs in, matching the worker-count knobs in
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageKind {
    Identification,
    Pre,
    Post,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Identification => "identification",
            StageKind::Pre => "pre",
            StageKind::Post => "post",
        }
    }
}

/// What a plugin hands back instead of raising an exception mid-stage.
pub enum PluginOutcome {
    /// Ran to completion; `Some((key, value))` is stored in the stage's
    /// result map under `key`.
    Ok(Option<(&'static str, Value)>),
    /// Equivalent to `CancelProcessing`/`CancelReporting`: the rest of the
    /// stage is skipped, the task is marked failed, nothing else in the
    /// fleet is treated as broken.
    Cancelled(String),
    /// Equivalent to `PluginError`/`PluginWorkerError`: something is wrong
    /// with the plugin or its environment, not just this analysis.
    Fatal(String),
}

#[derive(Clone)]
pub struct ProcessingContext {
    pub analysis_id: AnalysisId,
    pub stage: StageKind,
    pub category: String,
    pub result: ProcessingResult,
}

impl ProcessingContext {
    pub fn new(analysis_id: AnalysisId, stage: StageKind, category: impl Into<String>) -> Self {
        ProcessingContext { analysis_id, stage, category: category.into(), result: ProcessingResult::default() }
    }
}

#[async_trait]
pub trait ProcessingPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    /// Lower runs first. Ties broken by registration order.
    fn order(&self) -> i32 {
        0
    }
    /// Empty means "applies to every category".
    fn categories(&self) -> &'static [&'static str] {
        &[]
    }
    async fn run(&self, ctx: &mut ProcessingContext) -> PluginOutcome;
}

fn select_plugins(plugins: &[Arc<dyn ProcessingPlugin>], category: &str) -> Vec<Arc<dyn ProcessingPlugin>> {
    let mut selected: Vec<_> =
        plugins.iter().filter(|p| p.categories().is_empty() || p.categories().contains(&category)).cloned().collect();
    selected.sort_by_key(|p| p.order());
    selected
}

/// Outcome of running one stage's plugin fleet against one task/analysis.
/// Mirrors the worker-pool vocabulary: `Finished` is the happy path,
/// `WorkFailed` means this piece of work is done-but-failed (a plugin
/// cancelled, or wrote a duplicate key), `WorkerFailed` means the worker
/// itself hit something it can't recover from and should be considered
/// unhealthy by its supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Finished,
    WorkFailed(String),
    WorkerFailed(String),
}

/// Runs every applicable plugin in `plugins` against `ctx` in order,
/// stopping at the first cancellation or fatal error.
pub async fn run_stage(plugins: &[Arc<dyn ProcessingPlugin>], ctx: &mut ProcessingContext) -> WorkOutcome {
    let selected = select_plugins(plugins, &ctx.category);
    for plugin in &selected {
        match plugin.run(ctx).await {
            PluginOutcome::Ok(Some((key, value))) => {
                if let Err(e) = ctx.result.store(key, value) {
                    return WorkOutcome::WorkerFailed(format!("plugin {} tried to overwrite a result: {e}", plugin.name()));
                }
            }
            PluginOutcome::Ok(None) => {}
            PluginOutcome::Cancelled(reason) => {
                return WorkOutcome::WorkFailed(format!("{} cancelled by {}: {reason}", ctx.stage.as_str(), plugin.name()))
            }
            PluginOutcome::Fatal(err) => return WorkOutcome::WorkerFailed(format!("plugin {} failed: {err}", plugin.name())),
        }
    }
    WorkOutcome::Finished
}

/// One unit of work handed to a stage's worker pool.
pub struct WorkItem {
    pub ctx: ProcessingContext,
    pub reply: oneshot::Sender<(ProcessingContext, WorkOutcome)>,
}

/// A small fleet of async workers draining a single stage's work queue,
/// each running the same ordered plugin list against whatever task/analysis
/// shows up next — `original_source`'s equivalent runs one task per process;
/// here N workers share one channel instead of one process per task.
pub struct StageWorkerPool {
    tx: mpsc::Sender<WorkItem>,
    cancel: CancellationToken,
}

impl StageWorkerPool {
    pub fn spawn(stage: StageKind, worker_count: usize, plugins: Vec<Arc<dyn ProcessingPlugin>>) -> Self {
        let plugins = Arc::new(plugins);
        let (tx, rx) = mpsc::channel(worker_count.max(1) * 4);
        let rx = Arc::new(AsyncMutex::new(rx));
        let cancel = CancellationToken::new();

        for worker_id in 0..worker_count.max(1) {
            let rx = rx.clone();
            let plugins = plugins.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tracing::info_span!("processing_worker", stage = stage.as_str(), worker_id)
                    .in_scope(|| tracing::debug!("worker started"));
                loop {
                    let item = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => None,
                            item = rx.recv() => item,
                        }
                    };
                    let Some(WorkItem { mut ctx, reply }) = item else { break };
                    let outcome = run_stage(&plugins, &mut ctx).await;
                    let _ = reply.send((ctx, outcome));
                }
            });
        }

        StageWorkerPool { tx, cancel }
    }

    /// Submits one piece of work and awaits its outcome. `WORKER_FAIL` when
    /// the pool itself has been shut down and nothing is listening.
    pub async fn submit(&self, ctx: ProcessingContext) -> (ProcessingContext, WorkOutcome) {
        let fallback = ctx.clone();
        if self.cancel.is_cancelled() {
            return (fallback, WorkOutcome::WorkerFailed("worker pool is shut down".into()));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(WorkItem { ctx, reply: reply_tx }).await.is_err() {
            return (fallback, WorkOutcome::WorkerFailed("worker pool is shut down".into()));
        }
        reply_rx.await.unwrap_or_else(|_| (fallback, WorkOutcome::WorkerFailed("worker dropped its reply".into())))
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Groups the three stage pools a node runs, plus the plugin registry each
/// was built from, mirroring `make_event_consumper_map`'s per-type grouping
/// generalized to per-stage fleets instead of per-event-kind consumers.
pub struct ProcessingSupervisor {
    pub identification: StageWorkerPool,
    pub pre: StageWorkerPool,
    pub post: StageWorkerPool,
}

impl ProcessingSupervisor {
    pub fn new(counts: &warden_core::ProcessingCounts, registry: PluginRegistry) -> Self {
        ProcessingSupervisor {
            identification: StageWorkerPool::spawn(StageKind::Identification, counts.identification as usize, registry.for_stage(StageKind::Identification)),
            pre: StageWorkerPool::spawn(StageKind::Pre, counts.pre as usize, registry.for_stage(StageKind::Pre)),
            post: StageWorkerPool::spawn(StageKind::Post, counts.post as usize, registry.for_stage(StageKind::Post)),
        }
    }

    pub fn pool_for(&self, stage: StageKind) -> &StageWorkerPool {
        match stage {
            StageKind::Identification => &self.identification,
            StageKind::Pre => &self.pre,
            StageKind::Post => &self.post,
        }
    }

    pub fn shutdown_all(&self) {
        self.identification.shutdown();
        self.pre.shutdown();
        self.post.shutdown();
    }
}

/// Holds every registered plugin, grouped by the stage(s) it should run in.
#[derive(Default)]
pub struct PluginRegistry {
    by_stage: BTreeMap<&'static str, Vec<Arc<dyn ProcessingPlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stage: StageKind, plugin: Arc<dyn ProcessingPlugin>) {
        self.by_stage.entry(stage.as_str()).or_default().push(plugin);
    }

    fn for_stage(&self, stage: StageKind) -> Vec<Arc<dyn ProcessingPlugin>> {
        self.by_stage.get(stage.as_str()).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "processing_tests.rs"]
mod tests;
