// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The warden daemon: recovers durable state on startup, runs the
//! scheduler and task runner, and serves the Unix-domain sockets the
//! `warden` CLI and node-local components talk to.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bootstrap;
pub mod context;
pub mod driver;
pub mod error;
pub mod guest_agent;
pub mod result_server_client;
pub mod run_reporter;
pub mod sockets;

pub use bootstrap::{createcwd, is_initialized, load_config, load_machines, recover, require_initialized, RecoveredState};
pub use context::{Context, ShutdownHooks};
pub use driver::NullDriver;
pub use error::{DaemonError, DaemonResult};
pub use guest_agent::HttpGuestAgent;
pub use result_server_client::SocketResultServerHandle;
pub use run_reporter::{scheduler_on_result, InProcessRunReporter};
