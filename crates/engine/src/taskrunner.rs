// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task runner (C9): drives one task through its whole run on the
//! machine the scheduler handed it, then reports back.
//!
//! Grounded on `original_source/core/cuckoo/runners.py`'s `StandardTask`
//! run loop: result-server registration, machine boot, agent handshake,
//! a poll loop bounded by the analysis timeout, then teardown — every step
//! caught and turned into a `taskrunfailed` report rather than a panic, and
//! teardown (`machinery.stop`/`resultserver.remove`) runs exactly once on
//! every exit path rather than being duplicated at each early return.

use std::time::Duration;

use async_trait::async_trait;
use warden_adapters::{MachineDriver, MachineOp, MachineryManager};
use warden_core::{Machine, Task, TaskId};

use crate::taskflow::{TaskflowContext, TaskflowRegistry};

#[derive(Debug, thiserror::Error)]
pub enum TaskRunError {
    #[error("no taskflow registered for kind {0:?}")]
    UnknownKind(String),
    #[error("machine did not reach the expected state: {0}")]
    Machinery(#[from] warden_adapters::AdaptersError),
    #[error("guest agent never came online: {0}")]
    AgentTimeout(String),
    #[error(transparent)]
    Taskflow(#[from] crate::taskflow::TaskflowError),
}

/// Registers a task's result traffic with the result server and tears the
/// registration down again; the actual socket-facing implementation lives
/// behind the `resultserver.sock` IPC boundary in the daemon.
#[async_trait]
pub trait ResultServerHandle: Send + Sync {
    async fn add(&self, ip: &str, task_id: &TaskId) -> Result<(), TaskRunError>;
    async fn remove(&self, ip: &str, task_id: &TaskId);
}

/// Waits for the in-guest agent to answer. A real implementation polls the
/// agent's HTTP port; out of scope here the same way [`MachineDriver`] is.
#[async_trait]
pub trait GuestAgent: Send + Sync {
    async fn wait_online(&self, ip: &str, timeout: Duration) -> Result<(), TaskRunError>;
}

/// Reports a run's outcome back to the state controller over the
/// `statecontroller.sock` IPC boundary (C9 -> C5 is cross-process, per the
/// concurrency invariant that no component mutates another's state
/// directly).
#[async_trait]
pub trait RunReporter: Send + Sync {
    async fn task_run_done(&self, task_id: &TaskId);
    async fn task_run_failed(&self, task_id: &TaskId, reason: String);
}

/// What the poll loop needs from the owning analysis: how long the payload
/// gets to run, and whether that bound is enforced at all.
#[derive(Debug, Clone, Copy)]
pub struct RunTimeout {
    pub seconds: u32,
    pub enforced: bool,
}

const INTERVAL_CALL_WAIT: Duration = Duration::from_secs(2);
const AGENT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct TaskRunner<D: MachineDriver, A: GuestAgent, RS: ResultServerHandle, R: RunReporter> {
    machinery: MachineryManager<D>,
    taskflows: TaskflowRegistry,
    agent: A,
    result_server: RS,
    reporter: R,
}

impl<D, A, RS, R> TaskRunner<D, A, RS, R>
where
    D: MachineDriver,
    A: GuestAgent,
    RS: ResultServerHandle,
    R: RunReporter,
{
    pub fn new(machinery: MachineryManager<D>, taskflows: TaskflowRegistry, agent: A, result_server: RS, reporter: R) -> Self {
        TaskRunner { machinery, taskflows, agent, result_server, reporter }
    }

    /// Runs `task` on `machine` end to end and reports the outcome.
    /// Equivalent to spawning a dedicated thread per task on the original
    /// local node: callers `tokio::spawn` this per task rather than
    /// awaiting it inline, so one slow/stuck run never blocks another.
    pub async fn run(&self, task: Task, machine: Machine, timeout: RunTimeout) {
        let outcome = self.run_inner(&task, &machine, timeout).await;

        // teardown always runs, win or lose — one call site, not one per
        // early-return branch above.
        self.result_server.remove(&machine.ip, &task.id).await;
        let _ = self.machinery.submit_op(MachineOp::Stop, &machine.name).await;
        let _ = self.machinery.release(&machine.name);

        match outcome {
            Ok(()) => self.reporter.task_run_done(&task.id).await,
            Err(e) => self.reporter.task_run_failed(&task.id, e.to_string()).await,
        }
    }

    async fn run_inner(&self, task: &Task, machine: &Machine, timeout: RunTimeout) -> Result<(), TaskRunError> {
        let taskflow = self.taskflows.for_kind(&task.kind).ok_or_else(|| TaskRunError::UnknownKind(task.kind.clone()))?;
        let ctx = TaskflowContext { task, machine };

        self.result_server.add(&machine.ip, &task.id).await?;
        taskflow.initialize(&ctx).await?;

        self.machinery.submit_op(MachineOp::RestoreStart, &machine.name).await?;
        self.agent
            .wait_online(&machine.ip, AGENT_TIMEOUT)
            .await
            .map_err(|_| TaskRunError::AgentTimeout(machine.ip.clone()))?;
        taskflow.machine_online(&ctx).await?;

        if timeout.enforced {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(u64::from(timeout.seconds));
            while tokio::time::Instant::now() < deadline {
                taskflow.call_at_interval(&ctx).await?;
                tokio::time::sleep(INTERVAL_CALL_WAIT).await;
            }
        } else {
            taskflow.call_at_interval(&ctx).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "taskrunner_tests.rs"]
mod tests;
