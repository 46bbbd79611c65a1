// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A generic Unix-domain socket server: bind, accept, frame, dispatch.
//!
//! Grounded on `original_source/common/cuckoo/common/ipc.py`'s
//! `UnixSocketServer`, which binds a `socket.AF_UNIX` path, `listen()`s, and
//! spawns one reader loop per accepted connection, framing each message with
//! `ReaderWriter.get_json_message`/`send_json_message`. The four sockets in
//! §6 (`statecontroller`, `machinerymanager`, `taskrunner`, `resultserver`)
//! all share this shape — one JSON request in, one JSON response out, with
//! `statecontroller.sock`'s `setremote` subject the only fire-and-forget
//! exception (handlers may simply return a response the client ignores).
//!
//! Each connection is handled independently so a slow or stuck client never
//! blocks the others, matching the concurrency the daemon needs across its
//! sockets (§6, §9's integer-priority shutdown design doesn't apply here —
//! this module has no opinion on shutdown ordering, only on one socket's
//! accept loop).

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{read_json_message, write_json_message};
use crate::error::WireResult;

/// Implemented by whatever owns the domain logic behind one socket. `handle`
/// is called once per request with the already-deserialized message; the
/// returned response is framed and written back.
pub trait RequestHandler<Req, Resp>: Send + Sync + 'static {
    fn handle(&self, request: Req) -> impl Future<Output = Resp> + Send;
}

impl<F, Fut, Req, Resp> RequestHandler<Req, Resp> for F
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Resp> + Send,
{
    fn handle(&self, request: Req) -> impl Future<Output = Resp> + Send {
        self(request)
    }
}

pub struct UnixSocketServer {
    path: PathBuf,
    shutdown: CancellationToken,
}

impl UnixSocketServer {
    /// Binds `path`, unlinking a stale socket file left by a crashed prior
    /// run first (the Python original tolerates `EADDRINUSE` the same way).
    pub fn bind(path: impl Into<PathBuf>) -> WireResult<Self> {
        let path = path.into();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(UnixSocketServer { path, shutdown: CancellationToken::new() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A token the caller can hold to request shutdown with [`Self::stop`]
    /// from elsewhere without needing a handle back to this server.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Runs the accept loop until [`Self::stop`] is called or the token is
    /// cancelled. Each connection is handled on its own task; one connection
    /// erroring never brings down the listener.
    pub async fn serve<Req, Resp, H>(self, handler: H) -> WireResult<()>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        H: RequestHandler<Req, Resp> + Clone,
    {
        let listener = UnixListener::bind(&self.path)?;
        info!(path = %self.path.display(), "socket listening");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, _addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let handler = handler.clone();
                    let shutdown = self.shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, handler, shutdown).await {
                            debug!(error = %e, "connection ended with an error");
                        }
                    });
                }
            }
        }

        let _ = std::fs::remove_file(&self.path);
        Ok(())
    }
}

async fn serve_connection<Req, Resp, H>(
    stream: UnixStream,
    handler: H,
    shutdown: CancellationToken,
) -> WireResult<()>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    H: RequestHandler<Req, Resp>,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = tokio::io::BufReader::new(read_half);

    loop {
        let request: Option<Req> = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            msg = read_json_message(&mut reader) => msg?,
        };
        let Some(request) = request else { return Ok(()) };
        let response = handler.handle(request).await;
        write_json_message(&mut write_half, &response).await?;
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
