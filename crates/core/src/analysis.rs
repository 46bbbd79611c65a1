// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Analysis entity and its state machine (§3, §4.5).

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::ids::{AnalysisId, TaskId};
use crate::settings::{Category, Settings, Target};

/// Only the `core`-derived state set is implemented; see DESIGN.md
/// open-question decision #3 for why there is no legacy alias set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum AnalysisState {
    PendingIdentification,
    WaitingManual,
    PendingPre,
    CompletedPre,
    NoSelected,
    FatalError { reason: String },
}

crate::simple_display! {
    AnalysisState {
        PendingIdentification => "pending_identification",
        WaitingManual => "waiting_manual",
        PendingPre => "pending_pre",
        CompletedPre => "completed_pre",
        NoSelected => "no_selected",
        FatalError(..) => "fatal_error",
    }
}

impl AnalysisState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisState::NoSelected | AnalysisState::FatalError { .. })
    }
}

/// One recorded failure, timestamped via the injected [`Clock`] rather than a
/// wall-clock call, so error containers stay reproducible in tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContainer {
    pub errors: Vec<ErrorEntry>,
}

impl ErrorContainer {
    pub fn push(&mut self, clock: &impl Clock, message: impl Into<String>) {
        self.errors.push(ErrorEntry { message: message.into(), at_ms: clock.epoch_ms() });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: AnalysisId,
    pub created_at_ms: u64,
    pub category: Category,
    pub priority: u32,
    pub submitted_target: Target,
    pub selected_target: Option<Target>,
    pub settings: Settings,
    pub state: AnalysisState,
    #[serde(default)]
    pub errors: ErrorContainer,
    #[serde(default)]
    pub tasks: Vec<TaskId>,
}

impl Analysis {
    /// Construct a freshly submitted analysis. B1: `priority < 1` is rejected.
    pub fn new(
        id: AnalysisId,
        clock: &impl Clock,
        mut settings: Settings,
        submitted_target: Target,
        priority: u32,
    ) -> CoreResult<Self> {
        if priority < 1 {
            return Err(CoreError::Validation("priority must be >= 1".into()));
        }
        settings.validate()?;
        settings.normalize();
        let category = submitted_target.category();
        Ok(Analysis {
            id,
            created_at_ms: clock.epoch_ms(),
            category,
            priority,
            submitted_target,
            selected_target: None,
            settings,
            state: AnalysisState::PendingIdentification,
            errors: ErrorContainer::default(),
            tasks: Vec::new(),
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Unconditional transition used by the state controller reducer (engine
    /// crate); core only guarantees the resulting struct stays well-formed.
    pub fn transition_to(&mut self, state: AnalysisState) {
        self.state = state;
    }

    pub fn fail(&mut self, clock: &impl Clock, reason: impl Into<String>) {
        let reason = reason.into();
        self.errors.push(clock, reason.clone());
        self.state = AnalysisState::FatalError { reason };
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Analysis {
    /// Build a well-formed fixture directly (bypassing `Analysis::new`'s
    /// `Result`, which always succeeds for these fixed inputs).
    pub fn test_fixture(id: &str, clock: &impl Clock) -> Self {
        let id = match AnalysisId::from_string(id) {
            Ok(id) => id,
            Err(_) => AnalysisId::new(2026, 1, 1, &AnalysisId::random_suffix()),
        };
        let submitted_target = Target::File {
            path: "/tmp/sample".into(),
            sha256: "0".repeat(64),
            filename: "sample.bin".into(),
            media_type: None,
        };
        Analysis {
            category: submitted_target.category(),
            id,
            created_at_ms: clock.epoch_ms(),
            priority: 1,
            submitted_target,
            selected_target: None,
            settings: Settings::default(),
            state: AnalysisState::PendingIdentification,
            errors: ErrorContainer::default(),
            tasks: Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "analysis_tests.rs"]
mod tests;
