// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::migration::MigrationError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("work-finder scope already open")]
    ScopeAlreadyOpen,
    #[error("duplicate task id {0}")]
    DuplicateTask(String),
    #[error("duplicate analysis id {0}")]
    DuplicateAnalysis(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
