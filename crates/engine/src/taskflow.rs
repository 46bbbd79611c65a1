// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The taskflow trait and its kind registry, driven by the task runner
//! (C9) at the three points a running task's payload delivery can hook in.
//!
//! Grounded on `original_source/core/cuckoo/task.py`'s `Task` class and the
//! `kind == "standard"` dispatch in `original_source/core/cuckoo/runners.py`:
//! a small registry maps a task's `kind` string to an implementation,
//! mirroring the category→plugin registry already used for C4 processing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{Machine, Task};

#[derive(Debug, thiserror::Error)]
pub enum TaskflowError {
    #[error("taskflow step failed: {0}")]
    Failed(String),
}

pub type TaskflowResult<T> = Result<T, TaskflowError>;

/// What a taskflow needs at each hook point. Carries the task and the
/// machine it landed on; nothing here is owned by the taskflow itself.
pub struct TaskflowContext<'a> {
    pub task: &'a Task,
    pub machine: &'a Machine,
}

/// The three points the task runner calls into a taskflow at, in order:
/// once before the machine is started, once after the guest agent answers,
/// and then repeatedly until the analysis timeout elapses.
#[async_trait]
pub trait Taskflow: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn initialize(&self, ctx: &TaskflowContext<'_>) -> TaskflowResult<()>;

    /// Called once the guest agent is reachable; this is where a real
    /// implementation would upload the target and submission options.
    async fn machine_online(&self, ctx: &TaskflowContext<'_>) -> TaskflowResult<()>;

    /// Called repeatedly on the task runner's poll interval while the
    /// analysis timeout has not yet elapsed.
    async fn call_at_interval(&self, ctx: &TaskflowContext<'_>) -> TaskflowResult<()>;
}

/// The one production taskflow, registered for `kind == "standard"`. Agent
/// upload/monitor-injection/log-streaming are operational concerns of the
/// in-guest agent this control plane does not implement; each hook here
/// only logs the step so the run's timeline is visible in the task's own
/// log file, matching how little `StandardTaskflow`'s upstream equivalent
/// actually does beyond delegating to the agent RPC surface.
pub struct StandardTaskflow;

#[async_trait]
impl Taskflow for StandardTaskflow {
    fn kind(&self) -> &'static str {
        "standard"
    }

    async fn initialize(&self, ctx: &TaskflowContext<'_>) -> TaskflowResult<()> {
        tracing::debug!(task_id = %ctx.task.id, machine = %ctx.machine.name, "taskflow initialize");
        Ok(())
    }

    async fn machine_online(&self, ctx: &TaskflowContext<'_>) -> TaskflowResult<()> {
        tracing::debug!(task_id = %ctx.task.id, machine = %ctx.machine.name, "taskflow machine_online");
        Ok(())
    }

    async fn call_at_interval(&self, ctx: &TaskflowContext<'_>) -> TaskflowResult<()> {
        tracing::trace!(task_id = %ctx.task.id, "taskflow call_at_interval");
        Ok(())
    }
}

/// Maps a task's `kind` string to the taskflow implementation that should
/// drive it, the same pattern [`crate`]'s processing side uses for
/// category-keyed plugin lookup.
#[derive(Clone, Default)]
pub struct TaskflowRegistry {
    by_kind: HashMap<&'static str, Arc<dyn Taskflow>>,
}

impl TaskflowRegistry {
    pub fn new() -> Self {
        TaskflowRegistry::default()
    }

    pub fn register(&mut self, taskflow: Arc<dyn Taskflow>) {
        self.by_kind.insert(taskflow.kind(), taskflow);
    }

    pub fn for_kind(&self, kind: &str) -> Option<Arc<dyn Taskflow>> {
        self.by_kind.get(kind).cloned()
    }
}

#[cfg(test)]
#[path = "taskflow_tests.rs"]
mod tests;
