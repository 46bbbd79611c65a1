// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wardend`: the long-running control-plane process. Bootstraps the CWD,
//! recovers durable state, wires the scheduler/task runner/state controller,
//! and serves `statecontroller.sock`/`machinerymanager.sock`/`taskrunner.sock`
//! until a shutdown signal arrives.

use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use warden_adapters::{LocalNode, MachineryManager, PluginRegistry, ProcessingSupervisor};
use warden_core::{Paths, SystemClock};
use warden_engine::{NodeRegistry, Scheduler, SchedulerWaker, StandardTaskflow, StateController, TaskRunner, TaskflowRegistry};
use warden_storage::TaskQueue;

use warden_daemon::{
    bootstrap, context::Context, driver::NullDriver, error::DaemonError, guest_agent::HttpGuestAgent,
    result_server_client::SocketResultServerHandle, run_reporter, sockets,
};

fn resolve_cwd() -> Result<std::path::PathBuf, DaemonError> {
    if let Ok(dir) = std::env::var("WARDEN_CWD") {
        return Ok(std::path::PathBuf::from(dir));
    }
    dirs::home_dir().map(|h| h.join(".cuckoocwd")).ok_or(DaemonError::NoCwd)
}

fn acquire_lock(paths: &Paths) -> Result<std::fs::File, DaemonError> {
    let lock_path = paths.cwd().join("wardend.lock");
    let lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&lock_path)?;
    lock_file.try_lock_exclusive().map_err(|_| DaemonError::LockFailed(lock_path.clone()))?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

fn init_logging(paths: &Paths) -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = paths.cwd().join("operational").join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::never(&log_dir, "wardend.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warden=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(non_blocking).init();
    guard
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cwd = match resolve_cwd() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("{e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    let paths = Paths::new(&cwd);
    if let Err(e) = bootstrap::require_initialized(&paths) {
        eprintln!("{e}");
        return std::process::ExitCode::FAILURE;
    }

    let _log_guard = init_logging(&paths);
    info!(pid = std::process::id(), cwd = %paths.cwd().display(), "--- wardend: starting ---");

    match serve(paths).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to start daemon: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn serve(paths: Paths) -> Result<(), DaemonError> {
    let _lock = acquire_lock(&paths)?;

    let config = Arc::new(bootstrap::load_config(&paths)?);
    let paths = Arc::new(paths);

    let recovered = bootstrap::recover(&paths)?;
    let machines = bootstrap::load_machines(&paths)?;

    let machinery = MachineryManager::new(machines, NullDriver::new()).with_snapshot_path(paths.machine_snapshot_file());

    let mut taskflows = TaskflowRegistry::new();
    taskflows.register(Arc::new(StandardTaskflow));

    let local_queue = TaskQueue::new();
    let nodes = NodeRegistry::new();
    nodes.register(Arc::new(LocalNode::new("local", machinery.clone(), local_queue)));

    let processing = Arc::new(ProcessingSupervisor::new(&config.processing, PluginRegistry::new()));

    let scheduler_queue = recovered.queue.clone();

    let controller = StateController::new(
        SystemClock,
        config.clone(),
        paths.clone(),
        recovered.wal,
        recovered.state,
        recovered.queue,
        processing,
        nodes.clone(),
    );

    let runner = Arc::new(TaskRunner::new(
        machinery.clone(),
        taskflows,
        HttpGuestAgent::new(),
        SocketResultServerHandle::new(paths.socket("resultserver")),
        run_reporter::InProcessRunReporter::new(controller.clone()),
    ));

    let context = Context::new((*paths).clone(), (*config).clone());

    let state_controller_socket = sockets::bind(&paths, "statecontroller")?;
    let machinery_socket = sockets::bind(&paths, "machinerymanager")?;
    let task_runner_socket = sockets::bind(&paths, "taskrunner")?;

    let state_controller_shutdown = state_controller_socket.shutdown_token();
    let machinery_shutdown = machinery_socket.shutdown_token();
    let task_runner_shutdown = task_runner_socket.shutdown_token();

    let state_controller_task = tokio::spawn(sockets::serve_state_controller(state_controller_socket, controller.clone()));
    let machinery_task = tokio::spawn(sockets::serve_machinery(machinery_socket, machinery.clone()));
    let task_runner_task =
        tokio::spawn(sockets::serve_task_runner(task_runner_socket, paths.clone(), machinery.clone(), runner));

    let scheduler_shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(config.scheduler.clone(), scheduler_queue, nodes, SchedulerWaker::new());
    let scheduler_task = {
        let shutdown = scheduler_shutdown.clone();
        let on_result = run_reporter::scheduler_on_result(controller.clone());
        tokio::spawn(async move { scheduler.run(shutdown, on_result).await })
    };

    context.shutdown_hooks.register(998, "sockets", move || async move {
        state_controller_shutdown.cancel();
        machinery_shutdown.cancel();
        task_runner_shutdown.cancel();
    });
    context.shutdown_hooks.register(999, "scheduler", move || async move {
        scheduler_shutdown.cancel();
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install ctrl_c handler");
    }
    info!("shutdown signal received, draining");
    context.shutdown_hooks.run_all().await;

    let _ = state_controller_task.await;
    let _ = machinery_task.await;
    let _ = task_runner_task.await;
    let _ = scheduler_task.await;

    Ok(())
}
