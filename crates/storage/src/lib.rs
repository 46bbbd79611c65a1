// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage for the sandbox orchestration control plane: a
//! write-ahead log of [`event::StorageEvent`]s, the [`state::MaterializedState`]
//! rebuilt by replaying it, periodic zstd-compressed [`snapshot::Snapshot`]
//! checkpoints, the durable task [`queue::TaskQueue`], and the on-disk
//! layout under `storage/analyses/…` and `operational/generated/…` (§3, §4.2,
//! §6).

mod analysis_store;
mod checkpoint;
mod error;
mod event;
mod machine_snapshot;
mod migration;
mod queue;
mod snapshot;
mod state;
mod wal;

pub use analysis_store::{read_analysis, read_task, write_analysis, write_task};
pub use checkpoint::{load_snapshot, CheckpointResult, Checkpointer};
pub use error::{StorageError, StorageResult};
pub use event::StorageEvent;
pub use machine_snapshot::{dump as dump_machine_states, load as load_machine_states};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use queue::{TaskQueue, WorkFinderScope};
pub use snapshot::{Snapshot, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use wal::{Wal, WalEntry};
