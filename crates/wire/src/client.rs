// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A client for the Unix-domain sockets in §6.
//!
//! Grounded on `original_source/common/cuckoo/common/ipc.py`'s
//! `UnixSockClient`. Two corrections from the original are deliberate, not
//! oversights:
//!
//! - Its `connect()` retry condition is `if maxtries and tries >= tries:`,
//!   which always compares a variable to itself and so never gives up. This
//!   port compares against `maxtries`, so `connect_retrying` actually bounds
//!   its attempts.
//! - Its event-stream reader treats every disconnect the same way; this port
//!   keeps that reconnect-until-stopped behaviour but makes the backoff
//!   explicit and cancellable via a [`CancellationToken`] rather than a
//!   shared mutable "stop" flag.

use std::path::Path;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::{read_json_message, write_json_message};
use crate::error::{WireError, WireResult};

/// A connected client for one request/response socket.
pub struct UnixSockClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl UnixSockClient {
    /// Connects once, with no retry.
    pub async fn connect_once(path: impl AsRef<Path>) -> WireResult<Self> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        let (read_half, writer) = stream.into_split();
        Ok(UnixSockClient { reader: BufReader::new(read_half), writer })
    }

    /// Connects, retrying up to `maxtries` times with `delay` between
    /// attempts if the socket isn't up yet (the daemon may still be
    /// binding it). `maxtries == 0` means try forever.
    pub async fn connect(path: impl AsRef<Path>, maxtries: u32, delay: Duration) -> WireResult<Self> {
        let mut tries: u32 = 0;
        loop {
            match Self::connect_once(path.as_ref()).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    tries += 1;
                    if maxtries != 0 && tries >= maxtries {
                        return Err(e);
                    }
                    debug!(attempt = tries, error = %e, "socket not ready, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Sends a request and waits for exactly one response, optionally
    /// bounded by `timeout_after`.
    pub async fn request<Req, Resp>(&mut self, request: &Req, timeout_after: Option<Duration>) -> WireResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        write_json_message(&mut self.writer, request).await?;
        let read = read_json_message(&mut self.reader);
        let response = match timeout_after {
            Some(d) => timeout(d, read).await.map_err(|_| WireError::ResponseTimeout)??,
            None => read.await?,
        };
        response.ok_or(WireError::NotConnected)
    }

    /// Sends a request without waiting for a response (`setremote`, and any
    /// other subject a caller chooses to treat as fire-and-forget).
    pub async fn send<Req>(&mut self, request: &Req) -> WireResult<()>
    where
        Req: Serialize,
    {
        write_json_message(&mut self.writer, request).await
    }
}

/// Reconnecting subscriber for a server-push event stream. Reconnects with a
/// fixed backoff until `cancel` fires; never gives up on its own, matching
/// the original's "keep trying until told to stop" client loop.
pub struct EventStreamReader {
    path: std::path::PathBuf,
    backoff: Duration,
}

impl EventStreamReader {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        EventStreamReader { path: path.into(), backoff: Duration::from_secs(10) }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Calls `on_event` for every event received until `cancel` fires.
    /// Reconnects (after `backoff`) on any read error or clean disconnect.
    pub async fn run<Ev, F>(self, cancel: CancellationToken, mut on_event: F) -> WireResult<()>
    where
        Ev: DeserializeOwned,
        F: FnMut(Ev),
    {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            match UnixSockClient::connect_once(&self.path).await {
                Ok(mut client) => loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        msg = read_json_message(&mut client.reader) => msg,
                    };
                    match next {
                        Ok(Some(event)) => on_event(event),
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "event stream read failed, reconnecting");
                            break;
                        }
                    }
                },
                Err(e) => {
                    debug!(error = %e, "event stream connect failed, reconnecting");
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
