// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-wire: the IPC transport for the four control-plane sockets (§6).
//!
//! Framing is line-delimited JSON (one object per line, 5 MiB cap) over Unix
//! domain sockets — see [`codec`] for the framing itself, [`server`] for the
//! accept/dispatch loop, [`client`] for the dialing/request/event-stream
//! side, and [`messages`] for the request/response DTOs each socket carries.

pub mod client;
pub mod codec;
pub mod error;
pub mod messages;
pub mod server;

pub use client::{EventStreamReader, UnixSockClient};
pub use codec::{read_json_message, read_line_frame, write_json_message, write_line_frame, MAX_FRAME_BYTES};
pub use error::{WireError, WireResult};
pub use messages::{
    MachineryRequest, MachineryResponse, ResultServerRequest, ResultServerResponse,
    StateControllerRequest, StateControllerResponse, TaskRunnerRequest, TaskRunnerResponse,
};
pub use server::{RequestHandler, UnixSocketServer};
