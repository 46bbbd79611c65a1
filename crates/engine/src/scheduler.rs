// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler (C8): drains the task queue, matches tasks to machines
//! through the node registry, and hands matched work off to a small
//! task-starter worker pool.
//!
//! Grounded on `original_source/core/cuckoo/scheduler2.py`'s main loop:
//! wake on new work / a freed machine / a periodic timer, scan unscheduled
//! tasks once per wake using the dependency-hash ignore set so a platform
//! with no matching machine is skipped in O(1) after the first miss (P3),
//! and hand anything placeable to a bounded pool of task-starter workers
//! rather than starting it inline on the scheduler loop itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use warden_core::{Machine, SchedulerConfig, Task};
use warden_storage::TaskQueue;

use crate::nodes::NodeRegistry;

/// A task matched to a machine and the node that owns it, ready to be
/// handed to a task-starter worker.
pub struct StartableTask {
    pub task: Task,
    pub machine: Machine,
    pub node: Arc<dyn warden_adapters::Node>,
}

/// Wakes the scheduler loop out of its periodic sleep early. Cloned and
/// handed to whatever enqueues tasks or releases a machine.
#[derive(Clone, Default)]
pub struct SchedulerWaker {
    notify: Arc<Notify>,
}

impl SchedulerWaker {
    pub fn new() -> Self {
        SchedulerWaker::default()
    }

    pub fn wake(&self) {
        self.notify.notify_one();
    }
}

/// Drains the queue and dispatches startable tasks to a bounded pool of
/// task-starter workers; on starter failure, releases the machine and
/// reports the task failed back through the supplied callback.
pub struct Scheduler {
    config: SchedulerConfig,
    queue: TaskQueue,
    nodes: NodeRegistry,
    waker: SchedulerWaker,
}

/// What a task-starter worker reports back after attempting `node.add_task`.
pub enum StartOutcome {
    Started,
    Failed { machine_name: String, reason: String },
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, queue: TaskQueue, nodes: NodeRegistry, waker: SchedulerWaker) -> Self {
        Scheduler { config, queue, nodes, waker }
    }

    /// Runs the wake/scan/dispatch loop until `shutdown` fires. `on_result`
    /// is called once per dispatched task with its outcome — the state
    /// controller transitions the task to `Running` on success or
    /// `FatalError` on failure.
    pub async fn run<F, Fut>(&self, shutdown: tokio_util::sync::CancellationToken, on_result: F)
    where
        F: Fn(Task, StartOutcome) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let on_result = Arc::new(on_result);
        let (starter_tx, starter_rx) = mpsc::channel::<StartableTask>(self.config.task_starter_count.max(1) as usize * 4);
        let starter_rx = Arc::new(tokio::sync::Mutex::new(starter_rx));

        for _ in 0..self.config.task_starter_count.max(1) {
            let rx = starter_rx.clone();
            let on_result = on_result.clone();
            tokio::spawn(async move {
                loop {
                    let item = { rx.lock().await.recv().await };
                    let Some(StartableTask { task, machine, node }) = item else { break };
                    match node.add_task(task.clone()).await {
                        Ok(()) => on_result(task, StartOutcome::Started).await,
                        Err(e) => {
                            let _ = node.release_machine(&machine.name).await;
                            on_result(task, StartOutcome::Failed { machine_name: machine.name, reason: e.to_string() })
                                .await;
                        }
                    }
                }
            });
        }

        let wake_interval = Duration::from_secs(self.config.periodic_wake_secs.max(1));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.waker.notify.notified() => {}
                _ = tokio::time::sleep(wake_interval) => {}
            }
            if shutdown.is_cancelled() {
                break;
            }
            self.scan_once(&starter_tx).await;
        }
    }

    async fn scan_once(&self, starter_tx: &mpsc::Sender<StartableTask>) {
        if self.queue.is_empty() {
            return;
        }
        if !self.nodes.any_machine_available().await {
            return;
        }

        let mut scope = self.queue.open_scope();
        loop {
            let Some(task) = scope.next_unscheduled(None, None) else { break };
            match self.nodes.find_available(&task).await {
                Some((node, machine)) => {
                    scope.mark_scheduled(&task);
                    if starter_tx.send(StartableTask { task, machine, node }).await.is_err() {
                        break;
                    }
                }
                None => {
                    scope.ignore_similar(&task);
                }
            }
        }
    }

    pub fn waker(&self) -> SchedulerWaker {
        self.waker.clone()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
