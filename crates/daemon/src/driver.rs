// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`NullDriver`]: the production [`MachineDriver`] this binary ships with.
//!
//! Talking to a real hypervisor (libvirt/QEMU/Proxmox) is out of scope;
//! `warden_adapters::machinery::MachineDriver` is the boundary a production
//! backend plugs into. `fake::FakeDriver` over there is test-only
//! (`cfg(test, feature = "test-support")`), so something non-test-gated has
//! to implement the trait for the daemon binary to link at all. `NullDriver`
//! is that seam: it records the state an operation was asked to reach and
//! reports it back immediately, so the state-transition machinery above it
//! (waiters, fallbacks, disablement) is exercised end to end without a real
//! hypervisor underneath.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use warden_adapters::{default_outcome, AdaptersError, DriverMachineState, DriverOutcome, MachineDriver, MachineOp};
use warden_core::Machine;

#[derive(Default)]
pub struct NullDriver {
    reported_state: Mutex<HashMap<String, warden_core::MachineState>>,
}

impl NullDriver {
    pub fn new() -> Self {
        NullDriver::default()
    }
}

#[async_trait]
impl MachineDriver for NullDriver {
    async fn perform(&self, op: MachineOp, machine: &Machine) -> Result<DriverOutcome, AdaptersError> {
        let outcome = default_outcome(op);
        self.reported_state.lock().insert(machine.name.clone(), outcome.expected_state.clone());
        Ok(outcome)
    }

    async fn state_of(&self, machine: &Machine) -> DriverMachineState {
        let state = self.reported_state.lock().get(&machine.name).cloned().unwrap_or_else(|| machine.state.clone());
        DriverMachineState::Known(state)
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
