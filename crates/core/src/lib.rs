// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-core: domain model for the sandbox orchestrator control plane.
//!
//! Analysis/Task/Machine state, settings validation, ids, the clock
//! abstraction, and the typed configuration tree. No I/O lives here —
//! persistence is `warden-storage`, transport is `warden-wire`, and the
//! components that drive these types through their state machines are
//! `warden-adapters`/`warden-engine`.

pub mod macros;

pub mod analysis;
pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod ids;
pub mod machine;
pub mod paths;
pub mod settings;
pub mod signature;
pub mod task;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use analysis::{Analysis, AnalysisState, ErrorContainer, ErrorEntry};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, MachineryConfig, ProcessingCounts, RetrieverConfig, SchedulerConfig};
pub use error::{CoreError, CoreResult};
pub use id::short;
pub use ids::{AnalysisId, InvalidId, TaskId};
pub use machine::{Machine, MachineError, MachineState};
pub use paths::Paths;
pub use settings::{Category, PlatformSelection, Settings, Target};
#[cfg(any(test, feature = "test-support"))]
pub use settings::SettingsBuilder;
pub use signature::{DuplicateKey, InvalidScore, ProcessingResult, Signature, SignatureTracker};
pub use task::{dependency_hash, DependencyHash, Task, TaskState};
