// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Machine entity: inventory row owned by the machinery manager (C3).
//!
//! Lock/disable/reserve semantics enforce P1 (`available iff ¬disabled ∧
//! ¬locked ∧ ¬reserved`) and P2 (no two concurrent tasks hold the same lock).
//! This module only encodes the data and the single-machine invariants;
//! acquisition-by-constraint (name/platform/os_version/tags matching) and the
//! async state-transition worker pool live in `warden-adapters::machinery`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::TaskId;

/// Driver-reported runtime state. `Unknown` covers any state string the
/// driver returns that this control plane does not recognise — per §4.3 that
/// always disables the machine, it is never treated as a transient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum MachineState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
    Unknown(String),
}

crate::simple_display! {
    MachineState {
        Stopped => "stopped",
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
        Error => "error",
        Unknown(..) => "unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub name: String,
    pub label: String,
    pub ip: String,
    pub platform: String,
    pub os_version: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub snapshot: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub interface: Option<String>,
    pub agent_port: u16,
    pub machinery: String,
    pub state: MachineState,
    #[serde(default)]
    pub locked_by: Option<TaskId>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub disabled_reason: Option<String>,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub reserved_by: Option<String>,
    #[serde(default)]
    pub last_errors: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("machine {0:?} is already locked")]
    AlreadyLocked(String),
    #[error("machine {0:?} is not locked")]
    NotLocked(String),
    #[error("machine {0:?} is disabled: {1}")]
    Disabled(String, String),
}

impl Machine {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        ip: impl Into<String>,
        platform: impl Into<String>,
        os_version: impl Into<String>,
        machinery: impl Into<String>,
        agent_port: u16,
    ) -> Self {
        Machine {
            name: name.into(),
            label: label.into(),
            ip: ip.into(),
            platform: platform.into(),
            os_version: os_version.into(),
            tags: BTreeSet::new(),
            snapshot: None,
            mac: None,
            interface: None,
            agent_port,
            machinery: machinery.into(),
            state: MachineState::Stopped,
            locked_by: None,
            disabled: false,
            disabled_reason: None,
            reserved: false,
            reserved_by: None,
            last_errors: Vec::new(),
        }
    }

    /// P1: available iff not disabled, not locked, not reserved.
    pub fn is_available(&self) -> bool {
        !self.disabled && self.locked_by.is_none() && !self.reserved
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn matches_constraints(&self, platform: &str, os_version: &str, tags: &BTreeSet<String>) -> bool {
        self.platform == platform && self.os_version == os_version && tags.is_subset(&self.tags)
    }

    /// Exclusive lock transfer. P2 is enforced here: locking an already-locked
    /// machine is an error, never a silent steal.
    pub fn lock(&mut self, task_id: TaskId) -> Result<(), MachineError> {
        if self.disabled {
            return Err(MachineError::Disabled(
                self.name.clone(),
                self.disabled_reason.clone().unwrap_or_default(),
            ));
        }
        if self.locked_by.is_some() {
            return Err(MachineError::AlreadyLocked(self.name.clone()));
        }
        self.locked_by = Some(task_id);
        Ok(())
    }

    pub fn release(&mut self) -> Result<(), MachineError> {
        if self.locked_by.take().is_none() {
            return Err(MachineError::NotLocked(self.name.clone()));
        }
        Ok(())
    }

    pub fn disable(&mut self, reason: impl Into<String>) {
        self.disabled = true;
        let reason = reason.into();
        self.last_errors.push(reason.clone());
        self.disabled_reason = Some(reason);
        self.state = MachineState::Error;
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
