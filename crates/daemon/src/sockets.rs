// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binds and serves the daemon's own two listening sockets (§6):
//! `statecontroller.sock` and `machinerymanager.sock`, plus `taskrunner.sock`
//! which dispatches onto the task runner. `resultserver.sock` has no
//! corresponding `serve_*` function here: the daemon is a *client* of that
//! socket ([`crate::result_server_client::SocketResultServerHandle`]), not
//! its server — the result server is a separate component this binary does
//! not implement (out of scope, same as [`warden_adapters::MachineDriver`]).

use std::sync::Arc;

use warden_adapters::{MachineOp, MachineryManager};
use warden_core::{AnalysisId, Clock, Paths, TaskId};
use warden_engine::taskrunner::{GuestAgent, ResultServerHandle, RunReporter, RunTimeout};
use warden_engine::{StateController, TaskRunner};
use warden_storage::read_analysis;
use warden_wire::{
    MachineryRequest, MachineryResponse, TaskRunnerRequest, TaskRunnerResponse, UnixSocketServer,
};

use crate::driver::NullDriver;
use crate::error::DaemonResult;

pub fn bind(paths: &Paths, name: &str) -> DaemonResult<UnixSocketServer> {
    Ok(UnixSocketServer::bind(paths.socket(name))?)
}

/// Serves `statecontroller.sock`: every request is handed straight to
/// [`StateController::handle`].
pub async fn serve_state_controller<C: Clock + 'static>(
    server: UnixSocketServer,
    controller: StateController<C>,
) -> DaemonResult<()> {
    server
        .serve(move |req| {
            let controller = controller.clone();
            async move { controller.handle(req).await }
        })
        .await?;
    Ok(())
}

fn machine_op(req: &MachineryRequest) -> MachineOp {
    match req {
        MachineryRequest::RestoreStart { .. } => MachineOp::RestoreStart,
        MachineryRequest::NorestoreStart { .. } => MachineOp::NoRestoreStart,
        MachineryRequest::Stop { .. } => MachineOp::Stop,
        MachineryRequest::AcpiStop { .. } => MachineOp::AcpiStop,
    }
}

/// Serves `machinerymanager.sock`: translates each action into a
/// [`MachineryManager::submit_op`] call and reports the outcome.
pub async fn serve_machinery(server: UnixSocketServer, machinery: MachineryManager<NullDriver>) -> DaemonResult<()> {
    server
        .serve(move |req: MachineryRequest| {
            let machinery = machinery.clone();
            async move {
                let msg_id = req.msg_id();
                let machine = req.machine().to_string();
                let op = machine_op(&req);
                match machinery.submit_op(op, &machine).await {
                    Ok(()) => MachineryResponse { success: true, msg_id, reason: None },
                    Err(e) => MachineryResponse { success: false, msg_id, reason: Some(e.to_string()) },
                }
            }
        })
        .await?;
    Ok(())
}

/// Serves `taskrunner.sock`: looks up the durable task/analysis/machine
/// records `StartTask` names and, if all three resolve, spawns
/// [`TaskRunner::run`] detached — the run reports its own completion back
/// over `statecontroller.sock` via [`RunReporter`] rather than through this
/// response, matching C9 -> C5 being a separate socket hop (§6).
#[allow(clippy::too_many_arguments)]
pub async fn serve_task_runner<A, RS, R>(
    server: UnixSocketServer,
    paths: Arc<Paths>,
    machinery: MachineryManager<NullDriver>,
    runner: Arc<TaskRunner<NullDriver, A, RS, R>>,
) -> DaemonResult<()>
where
    A: GuestAgent + 'static,
    RS: ResultServerHandle + 'static,
    R: RunReporter + 'static,
{
    server
        .serve(move |req: TaskRunnerRequest| {
            let paths = paths.clone();
            let machinery = machinery.clone();
            let runner = runner.clone();
            async move {
                let TaskRunnerRequest::StartTask { task_id, analysis_id, machine, .. } = req;
                start_task(&paths, &machinery, &runner, task_id, analysis_id, machine).await
            }
        })
        .await?;
    Ok(())
}

async fn start_task<A, RS, R>(
    paths: &Paths,
    machinery: &MachineryManager<NullDriver>,
    runner: &Arc<TaskRunner<NullDriver, A, RS, R>>,
    task_id: String,
    analysis_id: String,
    machine_name: String,
) -> TaskRunnerResponse
where
    A: GuestAgent + 'static,
    RS: ResultServerHandle + 'static,
    R: RunReporter + 'static,
{
    let id = match TaskId::from_string(task_id) {
        Ok(id) => id,
        Err(e) => return TaskRunnerResponse { success: false, reason: Some(e.to_string()) },
    };
    let task = match warden_storage::read_task(paths, &id) {
        Ok(task) => task,
        Err(e) => return TaskRunnerResponse { success: false, reason: Some(format!("task {id} unreadable: {e}")) },
    };
    let analysis = match AnalysisId::from_string(analysis_id).map_err(|e| e.to_string()).and_then(|aid| {
        read_analysis(paths, &aid).map_err(|e| e.to_string())
    }) {
        Ok(analysis) => analysis,
        Err(e) => return TaskRunnerResponse { success: false, reason: Some(e) },
    };
    let machine = match machinery.machine(&machine_name) {
        Some(m) => m,
        None => return TaskRunnerResponse { success: false, reason: Some(format!("unknown machine {machine_name}")) },
    };

    let timeout = RunTimeout { seconds: analysis.settings.timeout, enforced: analysis.settings.enforce_timeout };
    let runner = runner.clone();
    tokio::spawn(async move { runner.run(task, machine, timeout).await });

    TaskRunnerResponse { success: true, reason: None }
}

#[cfg(test)]
#[path = "sockets_tests.rs"]
mod tests;
