// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTOs exchanged over the four Unix-domain sockets (§6): `statecontroller`,
//! `machinerymanager`, `taskrunner`, and `resultserver`. Each request enum is
//! tagged by `subject`/`action` the way `query.rs`'s `CronSummary` family
//! tags by `type`, so a socket's framing stays a flat, greppable JSON object
//! rather than a nested envelope.

use serde::{Deserialize, Serialize};

// ── statecontroller.sock ────────────────────────────────────────────────

/// Requests accepted on `statecontroller.sock` (§4.5). All but `setremote`
/// are request/response; `setremote` is fire-and-forget bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subject", rename_all = "snake_case")]
pub enum StateControllerRequest {
    /// A new analysis has landed on disk and should enter identification.
    TrackNew { analysis_id: String },
    /// A worker finished a unit of work for an analysis successfully.
    /// `task_id` is present for the per-task `post` stage, absent for the
    /// per-analysis `identification`/`pre` stages.
    WorkDone { analysis_id: String, stage: String, #[serde(default)] task_id: Option<String> },
    /// A worker failed a unit of work for an analysis.
    WorkFail {
        analysis_id: String,
        stage: String,
        reason: String,
        #[serde(default)]
        task_id: Option<String>,
    },
    /// An operator supplied settings for an analysis parked in
    /// `waiting_manual`. Rejected unless the analysis is in that state.
    ManualSetSettings { analysis_id: String, settings: serde_json::Value },
    /// C9 reports a task run completed; drives the task to `pending_post`.
    TaskRunDone { task_id: String },
    /// C9 reports a task run failed; drives the task to `fatal_error`.
    TaskRunFailed { task_id: String, reason: String },
    /// C6 bookkeeping: associate a task with the remote node executing it.
    SetRemote { task_id: String, node: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateControllerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StateControllerResponse {
    pub fn ok() -> Self {
        StateControllerResponse { success: true, reason: None }
    }

    pub fn err(reason: impl Into<String>) -> Self {
        StateControllerResponse { success: false, reason: Some(reason.into()) }
    }
}

// ── machinerymanager.sock ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MachineryRequest {
    RestoreStart { machine: String, msg_id: u64 },
    NorestoreStart { machine: String, msg_id: u64 },
    Stop { machine: String, msg_id: u64 },
    AcpiStop { machine: String, msg_id: u64 },
}

impl MachineryRequest {
    pub fn msg_id(&self) -> u64 {
        match self {
            MachineryRequest::RestoreStart { msg_id, .. }
            | MachineryRequest::NorestoreStart { msg_id, .. }
            | MachineryRequest::Stop { msg_id, .. }
            | MachineryRequest::AcpiStop { msg_id, .. } => *msg_id,
        }
    }

    pub fn machine(&self) -> &str {
        match self {
            MachineryRequest::RestoreStart { machine, .. }
            | MachineryRequest::NorestoreStart { machine, .. }
            | MachineryRequest::Stop { machine, .. }
            | MachineryRequest::AcpiStop { machine, .. } => machine,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineryResponse {
    pub success: bool,
    pub msg_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ── taskrunner.sock ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TaskRunnerRequest {
    StartTask {
        task_id: String,
        analysis_id: String,
        kind: String,
        machine: String,
        result_ip: String,
        result_port: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRunnerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ── resultserver.sock ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResultServerRequest {
    Add { ip: String, task_id: String },
    Remove { ip: String, task_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultServerResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
