// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the task runner's [`RunReporter`] callback and the scheduler's
//! `on_result` callback to the in-process [`StateController`], without
//! going through `statecontroller.sock` — both run inside the daemon's own
//! process, so there is no IPC boundary to cross here the way there is
//! between this daemon and a remote node (C6).

use async_trait::async_trait;
use tracing::warn;
use warden_core::{Clock, Task, TaskId};
use warden_engine::taskrunner::RunReporter;
use warden_engine::{StartOutcome, StateController};
use warden_wire::StateControllerRequest;

/// Reports a finished task run back to the reducer by calling `handle`
/// directly, bypassing the socket since both live in this process.
pub struct InProcessRunReporter<C: Clock + 'static> {
    controller: StateController<C>,
}

impl<C: Clock + 'static> InProcessRunReporter<C> {
    pub fn new(controller: StateController<C>) -> Self {
        InProcessRunReporter { controller }
    }
}

#[async_trait]
impl<C: Clock + 'static> RunReporter for InProcessRunReporter<C> {
    async fn task_run_done(&self, task_id: &TaskId) {
        let resp = self
            .controller
            .handle(StateControllerRequest::TaskRunDone { task_id: task_id.as_str().to_string() })
            .await;
        if !resp.success {
            warn!(%task_id, reason = ?resp.reason, "task_run_done rejected by the state controller");
        }
    }

    async fn task_run_failed(&self, task_id: &TaskId, reason: String) {
        let resp = self
            .controller
            .handle(StateControllerRequest::TaskRunFailed { task_id: task_id.as_str().to_string(), reason })
            .await;
        if !resp.success {
            warn!(%task_id, reason = ?resp.reason, "task_run_failed rejected by the state controller");
        }
    }
}

/// Reports the scheduler's dispatch outcome (did the task actually start
/// running on its machine) back to the reducer. Unlike [`InProcessRunReporter`]
/// this isn't a socket boundary anywhere in the original design either —
/// `task_started`/`task_start_failed` aren't wire subjects, just the
/// reducer's own bookkeeping for a task the scheduler just placed.
pub async fn report_scheduler_outcome<C: Clock + 'static>(controller: &StateController<C>, task: Task, outcome: StartOutcome) {
    match outcome {
        StartOutcome::Started => {
            let machine = task.machine_name.clone().unwrap_or_default();
            if let Err(e) = controller.task_started(task.id.to_string(), machine).await {
                warn!(task_id = %task.id, error = %e, "failed to record task start");
            }
        }
        StartOutcome::Failed { reason, .. } => {
            if let Err(e) = controller.task_start_failed(task.id.to_string(), reason).await {
                warn!(task_id = %task.id, error = %e, "failed to record task start failure");
            }
        }
    }
}

/// Convenience for wiring [`Scheduler::run`]'s `on_result` callback to
/// [`report_scheduler_outcome`] without the caller repeating the clone dance.
pub fn scheduler_on_result<C: Clock + 'static>(
    controller: StateController<C>,
) -> impl Fn(Task, StartOutcome) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync + 'static {
    move |task, outcome| {
        let controller = controller.clone();
        Box::pin(async move { report_scheduler_outcome(&controller, task, outcome).await })
    }
}

#[cfg(test)]
#[path = "run_reporter_tests.rs"]
mod tests;
