// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-delimited JSON framing (§4.1, §6): one JSON object per line, UTF-8,
//! LF-terminated, receive buffer capped at 5 MiB.
//!
//! `readline`/`get_json_message`/`send_json_message` style framing,
//! reimplemented against tokio's async I/O traits instead of a non-blocking
//! socket with manual buffer growth. Newline framing, not a length-prefixed
//! frame, since that's what the control plane on the other end of the wire
//! speaks.

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{WireError, WireResult};

/// Maximum bytes buffered for one message before the connection is dropped.
pub const MAX_FRAME_BYTES: usize = 5 * 1024 * 1024;

/// Read one LF-terminated frame. Returns `Ok(None)` on a clean EOF with an
/// empty buffer (peer disconnected between messages); `Err(TruncatedFrame)`
/// on EOF mid-message; `Err(FrameTooLarge)` once the 5 MiB cap is exceeded
/// (P7 — oversize frames must not advance server state).
pub async fn read_line_frame(reader: &mut (impl AsyncBufRead + Unpin)) -> WireResult<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    loop {
        let mut chunk = Vec::new();
        let n = reader.read_until(b'\n', &mut chunk).await?;
        if n == 0 {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(WireError::TruncatedFrame)
            };
        }
        buf.extend_from_slice(&chunk);
        if buf.len() > MAX_FRAME_BYTES {
            return Err(WireError::FrameTooLarge(MAX_FRAME_BYTES));
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            return Ok(Some(buf));
        }
    }
}

pub async fn write_line_frame(writer: &mut (impl AsyncWrite + Unpin), bytes: &[u8]) -> WireResult<()> {
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(WireError::FrameTooLarge(MAX_FRAME_BYTES));
    }
    writer.write_all(bytes).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and deserialize it as JSON.
pub async fn read_json_message<T: DeserializeOwned>(
    reader: &mut (impl AsyncBufRead + Unpin),
) -> WireResult<Option<T>> {
    match read_line_frame(reader).await? {
        None => Ok(None),
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
    }
}

pub async fn write_json_message<T: Serialize>(
    writer: &mut (impl AsyncWrite + Unpin),
    value: &T,
) -> WireResult<()> {
    let bytes = serde_json::to_vec(value)?;
    write_line_frame(writer, &bytes).await
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
