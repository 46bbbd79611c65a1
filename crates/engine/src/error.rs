// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no analysis {0:?} is tracked")]
    UnknownAnalysis(String),
    #[error("no task {0:?} is tracked")]
    UnknownTask(String),
    #[error("analysis {0:?} is in state {1}, not waiting_manual")]
    NotWaitingManual(String, String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Adapters(#[from] warden_adapters::AdaptersError),
    #[error(transparent)]
    Storage(#[from] warden_storage::StorageError),
    #[error(transparent)]
    Core(#[from] warden_core::CoreError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
