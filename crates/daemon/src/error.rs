// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crate-boundary error type for the daemon binary's own bootstrap and
//! socket-wiring code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("no CWD configured and no home directory to default one into")]
    NoCwd,

    #[error("{0} is not initialized; run `warden createcwd` first")]
    NotInitialized(std::path::PathBuf),

    #[error("failed to acquire the daemon lock at {0}: another instance is already running")]
    LockFailed(std::path::PathBuf),

    #[error(transparent)]
    Core(#[from] warden_core::CoreError),

    #[error(transparent)]
    Storage(#[from] warden_storage::StorageError),

    #[error(transparent)]
    Wire(#[from] warden_wire::WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DaemonResult<T> = Result<T, DaemonError>;
