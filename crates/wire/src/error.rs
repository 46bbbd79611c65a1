// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crate-boundary error type for `warden-wire`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame exceeded the {0} byte cap")]
    FrameTooLarge(usize),

    #[error("connection closed with a partial, non-terminated frame")]
    TruncatedFrame,

    #[error("not connected")]
    NotConnected,

    #[error("timed out waiting for a response")]
    ResponseTimeout,

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type WireResult<T> = Result<T, WireError>;
