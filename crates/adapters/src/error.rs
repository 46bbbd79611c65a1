// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;
use warden_core::MachineError;

#[derive(Debug, Error)]
pub enum AdaptersError {
    #[error("no machine named {0:?}")]
    UnknownMachine(String),
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error("node {0:?} has no ready machine for the requested constraints")]
    NoMachineAvailable(String),
    #[error("node {0:?} is not ready")]
    NodeNotReady(String),
    #[error("machine {0:?} already has an operation in flight")]
    OperationInProgress(String),
    #[error("machine {0:?} entered an unrecoverable state waiting for a driver operation: {1}")]
    DriverWait(String, String),
    #[error("background task panicked: {0}")]
    TaskPanicked(String),
    #[error(transparent)]
    Storage(#[from] warden_storage::StorageError),
    #[error(transparent)]
    Wire(#[from] warden_wire::WireError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

pub type AdaptersResult<T> = Result<T, AdaptersError>;
