// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::clock::Clock;
use crate::ids::{AnalysisId, TaskId};
use crate::machine::Machine;
use crate::task::Task;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for the task queue's ordering/dephash properties (P3/P4).
pub mod strategies {
    use proptest::prelude::*;

    pub fn arb_platform() -> impl Strategy<Value = String> {
        prop_oneof![Just("windows".to_string()), Just("linux".to_string()), Just("macos".to_string())]
    }

    pub fn arb_tag() -> impl Strategy<Value = String> {
        prop_oneof![Just("slow".to_string()), Just("gpu".to_string()), Just("x64".to_string())]
    }

    pub fn arb_priority() -> impl Strategy<Value = u32> {
        1u32..20
    }
}

// ── Fixture factories ─────────────────────────────────────────────────

pub fn analysis_id(suffix: &str) -> AnalysisId {
    AnalysisId::new(2026, 1, 1, suffix)
}

pub fn task_fixture(clock: &impl Clock, analysis_suffix: &str, task_number: u32, platform: &str) -> Task {
    let aid = analysis_id(analysis_suffix);
    Task::new(
        TaskId::new(&aid, task_number),
        aid,
        1,
        clock.epoch_ms(),
        platform,
        "10",
        Default::default(),
        None,
        None,
    )
}

pub fn machine_fixture(name: &str, platform: &str, os_version: &str) -> Machine {
    Machine::new(name, format!("{platform} {os_version}"), "10.0.0.1", platform, os_version, "qemu", 8000)
}
