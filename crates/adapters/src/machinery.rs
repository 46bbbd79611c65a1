// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The machinery manager (C3): machine inventory, acquisition/release/disable,
//! and the async worker pool that drives state-changing driver operations.
//!
//! Grounded on `original_source/core/cuckoo/machinery.py`'s `MachineryManager`
//! /`MachineryWorker`/`WorkTracker`: state-changing calls return
//! `(expected_state, timeout, fallback?)`, a waiters list is polled for each
//! outstanding operation, and a timed-out waiter either falls back to another
//! op (`acpi_stop → stop`) or disables the machine.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use warden_core::{Machine, MachineState, TaskId};

use crate::error::{AdaptersError, AdaptersResult};

/// One of the five state-changing operations a driver is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineOp {
    RestoreStart,
    NoRestoreStart,
    Stop,
    AcpiStop,
    DumpMemory,
}

/// What a driver call returns: the state to wait for, how long to wait, and
/// an optional fallback op to run if the deadline passes first.
pub struct DriverOutcome {
    pub expected_state: MachineState,
    pub timeout: Duration,
    pub fallback: Option<MachineOp>,
}

pub enum DriverMachineState {
    Known(MachineState),
    Unknown(String),
}

/// The thing that actually talks to libvirt/QEMU/Proxmox. Out of scope to
/// implement for real; this trait is the boundary a production backend
/// would plug into.
#[async_trait]
pub trait MachineDriver: Send + Sync {
    async fn perform(&self, op: MachineOp, machine: &Machine) -> Result<DriverOutcome, AdaptersError>;
    async fn state_of(&self, machine: &Machine) -> DriverMachineState;
}

/// Default per-op timeouts, matching the driver-module constants.
fn default_timeout(op: MachineOp) -> Duration {
    match op {
        MachineOp::RestoreStart | MachineOp::NoRestoreStart | MachineOp::Stop | MachineOp::DumpMemory => {
            Duration::from_secs(60)
        }
        MachineOp::AcpiStop => Duration::from_secs(120),
    }
}

fn expected_state_for(op: MachineOp) -> MachineState {
    match op {
        MachineOp::RestoreStart | MachineOp::NoRestoreStart | MachineOp::DumpMemory => MachineState::Running,
        MachineOp::Stop | MachineOp::AcpiStop => MachineState::Stopping,
    }
}

struct Waiter {
    machine: String,
    expected_state: MachineState,
    deadline: Instant,
    fallback: Option<MachineOp>,
    reply: Option<oneshot::Sender<AdaptersResult<()>>>,
}

struct Inner {
    machines: HashMap<String, Machine>,
    op_locks: HashSet<String>,
}

/// Owns the machine inventory and drives its async state transitions.
pub struct MachineryManager<D: MachineDriver> {
    inner: Arc<Mutex<Inner>>,
    driver: Arc<D>,
    waiters: Arc<Mutex<Vec<Waiter>>>,
    snapshot_path: Option<PathBuf>,
}

impl<D: MachineDriver> Clone for MachineryManager<D> {
    fn clone(&self) -> Self {
        MachineryManager {
            inner: self.inner.clone(),
            driver: self.driver.clone(),
            waiters: self.waiters.clone(),
            snapshot_path: self.snapshot_path.clone(),
        }
    }
}

impl<D: MachineDriver> MachineryManager<D> {
    pub fn new(machines: Vec<Machine>, driver: D) -> Self {
        let machines = machines.into_iter().map(|m| (m.name.clone(), m)).collect();
        MachineryManager {
            inner: Arc::new(Mutex::new(Inner { machines, op_locks: HashSet::new() })),
            driver: Arc::new(driver),
            waiters: Arc::new(Mutex::new(Vec::new())),
            snapshot_path: None,
        }
    }

    pub fn with_snapshot_path(mut self, path: PathBuf) -> Self {
        self.snapshot_path = Some(path);
        self
    }

    pub fn machine(&self, name: &str) -> Option<Machine> {
        self.inner.lock().machines.get(name).cloned()
    }

    pub fn all_machines(&self) -> Vec<Machine> {
        self.inner.lock().machines.values().cloned().collect()
    }

    /// Atomically selects the first available machine matching `name` or
    /// `(platform, os_version, tags)`, locks it to `task_id`. `None` if
    /// nothing matches — single lock enforces exactly-one ownership.
    pub fn acquire_available(
        &self,
        task_id: TaskId,
        name: Option<&str>,
        platform: Option<&str>,
        os_version: Option<&str>,
        tags: &std::collections::BTreeSet<String>,
    ) -> Option<Machine> {
        let mut inner = self.inner.lock();
        let found = inner.machines.values_mut().find(|m| {
            m.is_available()
                && (name.map(|n| m.matches_name(n)).unwrap_or(false)
                    || (platform.is_some()
                        && os_version.is_some()
                        && m.matches_constraints(platform.unwrap_or_default(), os_version.unwrap_or_default(), tags)))
        })?;
        found.lock(task_id).ok()?;
        let machine = found.clone();
        drop(inner);
        self.persist_snapshot();
        Some(machine)
    }

    pub fn release(&self, name: &str) -> AdaptersResult<()> {
        let mut inner = self.inner.lock();
        let machine = inner.machines.get_mut(name).ok_or_else(|| AdaptersError::UnknownMachine(name.into()))?;
        machine.release()?;
        drop(inner);
        self.persist_snapshot();
        Ok(())
    }

    pub fn disable(&self, name: &str, reason: impl Into<String>) -> AdaptersResult<()> {
        let mut inner = self.inner.lock();
        let machine = inner.machines.get_mut(name).ok_or_else(|| AdaptersError::UnknownMachine(name.into()))?;
        machine.disable(reason);
        drop(inner);
        self.persist_snapshot();
        Ok(())
    }

    /// Submits a state-changing op to the named machine. A second op on a
    /// machine already in flight is rejected rather than raced against the
    /// driver: a per-machine lock prevents concurrent driver calls on the
    /// same machine.
    pub async fn submit_op(&self, op: MachineOp, machine_name: &str) -> AdaptersResult<()> {
        {
            let mut inner = self.inner.lock();
            if !inner.op_locks.insert(machine_name.to_string()) {
                return Err(AdaptersError::OperationInProgress(machine_name.into()));
            }
        }
        let (tx, rx) = oneshot::channel();
        self.run_op(op, machine_name, tx).await;
        rx.await.unwrap_or(Err(AdaptersError::UnknownMachine(machine_name.into())))
    }

    async fn run_op(&self, op: MachineOp, machine_name: &str, reply: oneshot::Sender<AdaptersResult<()>>) {
        let machine = match self.machine(machine_name) {
            Some(m) => m,
            None => {
                self.inner.lock().op_locks.remove(machine_name);
                let _ = reply.send(Err(AdaptersError::UnknownMachine(machine_name.into())));
                return;
            }
        };

        match self.driver.perform(op, &machine).await {
            Ok(outcome) => {
                let deadline = Instant::now() + outcome.timeout;
                self.waiters.lock().push(Waiter {
                    machine: machine_name.to_string(),
                    expected_state: outcome.expected_state,
                    deadline,
                    fallback: outcome.fallback,
                    reply: Some(reply),
                });
            }
            Err(e) => {
                self.inner.lock().op_locks.remove(machine_name);
                let _ = reply.send(Err(e));
            }
        }
    }

    /// One pass over the waiters list: resolves finished/errored/timed-out
    /// operations, re-queues fallbacks, and leaves the rest for next tick.
    pub async fn poll_waiters(&self) {
        let due: Vec<Waiter> = self.waiters.lock().drain(..).collect();

        for mut waiter in due {
            let Some(machine) = self.machine(&waiter.machine) else {
                self.inner.lock().op_locks.remove(&waiter.machine);
                if let Some(reply) = waiter.reply.take() {
                    let _ = reply.send(Err(AdaptersError::UnknownMachine(waiter.machine.clone())));
                }
                continue;
            };

            match self.driver.state_of(&machine).await {
                DriverMachineState::Known(state) if state == waiter.expected_state => {
                    self.inner.lock().op_locks.remove(&waiter.machine);
                    if let Some(reply) = waiter.reply.take() {
                        let _ = reply.send(Ok(()));
                    }
                }
                DriverMachineState::Known(MachineState::Error) => {
                    let _ = self.disable(&waiter.machine, "error state");
                    self.inner.lock().op_locks.remove(&waiter.machine);
                    if let Some(reply) = waiter.reply.take() {
                        let _ = reply.send(Err(AdaptersError::DriverWait(waiter.machine.clone(), "entered error state".into())));
                    }
                }
                DriverMachineState::Unknown(reason) => {
                    let _ = self.disable(&waiter.machine, format!("unknown driver state: {reason}"));
                    self.inner.lock().op_locks.remove(&waiter.machine);
                    if let Some(reply) = waiter.reply.take() {
                        let _ = reply.send(Err(AdaptersError::DriverWait(waiter.machine.clone(), "reported an unrecognised driver state".into())));
                    }
                }
                DriverMachineState::Known(_) if Instant::now() < waiter.deadline => {
                    self.waiters.lock().push(waiter);
                }
                DriverMachineState::Known(_) => {
                    if let Some(fallback) = waiter.fallback.take() {
                        self.inner.lock().op_locks.remove(&waiter.machine);
                        let machine_name = waiter.machine.clone();
                        let reply = waiter.reply.take();
                        if self.inner.lock().op_locks.insert(machine_name.clone()) {
                            if let Some(reply) = reply {
                                self.run_op(fallback, &machine_name, reply).await;
                            }
                        }
                    } else {
                        let _ = self.disable(&waiter.machine, "timed out waiting for state transition");
                        self.inner.lock().op_locks.remove(&waiter.machine);
                        if let Some(reply) = waiter.reply.take() {
                            let _ = reply.send(Err(AdaptersError::DriverWait(waiter.machine.clone(), "timed out waiting for state transition".into())));
                        }
                    }
                }
            }
        }
    }

    /// Runs [`Self::poll_waiters`] on a fixed tick until cancelled.
    pub async fn run_waiter_loop(&self, cancel: CancellationToken, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => self.poll_waiters().await,
            }
        }
    }

    fn persist_snapshot(&self) {
        let Some(path) = &self.snapshot_path else { return };
        let machines = self.all_machines();
        if let Err(e) = warden_storage::dump_machine_states(path, &machines) {
            tracing::warn!(error = %e, "failed to persist machine snapshot");
        }
    }
}

/// Default expected state / timeout for an op, for drivers that don't want
/// to special-case `DriverOutcome` construction themselves.
pub fn default_outcome(op: MachineOp) -> DriverOutcome {
    let fallback = matches!(op, MachineOp::AcpiStop).then_some(MachineOp::Stop);
    DriverOutcome { expected_state: expected_state_for(op), timeout: default_timeout(op), fallback }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// An in-memory driver for tests: every `perform` transitions the
    /// machine's state field a fixed number of polls after the call, or
    /// never (to exercise the timeout/fallback path).
    pub struct FakeDriver {
        pub polls_until_ready: AtomicU32,
        pub polls_elapsed: Mutex<HashMap<String, u32>>,
        pub report_error_state: Mutex<HashSet<String>>,
        pub report_unknown_state: Mutex<HashSet<String>>,
    }

    impl Default for FakeDriver {
        fn default() -> Self {
            FakeDriver {
                polls_until_ready: AtomicU32::new(1),
                polls_elapsed: Mutex::new(HashMap::new()),
                report_error_state: Mutex::new(HashSet::new()),
                report_unknown_state: Mutex::new(HashSet::new()),
            }
        }
    }

    #[async_trait]
    impl MachineDriver for FakeDriver {
        async fn perform(&self, op: MachineOp, _machine: &Machine) -> Result<DriverOutcome, AdaptersError> {
            Ok(default_outcome(op))
        }

        async fn state_of(&self, machine: &Machine) -> DriverMachineState {
            if self.report_error_state.lock().contains(&machine.name) {
                return DriverMachineState::Known(MachineState::Error);
            }
            if self.report_unknown_state.lock().contains(&machine.name) {
                return DriverMachineState::Unknown("driver-specific state".into());
            }
            let mut elapsed = self.polls_elapsed.lock();
            let count = elapsed.entry(machine.name.clone()).or_insert(0);
            *count += 1;
            let ready_at = self.polls_until_ready.load(Ordering::SeqCst);
            if *count >= ready_at {
                DriverMachineState::Known(machine.state.clone())
            } else {
                DriverMachineState::Known(MachineState::Starting)
            }
        }
    }
}

#[cfg(test)]
#[path = "machinery_tests.rs"]
mod tests;
