// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`HttpGuestAgent`]: polls the in-guest agent's HTTP status endpoint until
//! it answers or the timeout the task runner supplies elapses.
//!
//! Grounded on `original_source/core/cuckoo/runners.py`'s machine-boot wait
//! loop (`agent.wait_available` / retry on connection refused). The agent's
//! actual API surface (submitting the analyzer, pulling results) is out of
//! scope here the same way `MachineDriver` is — this only answers "is it up
//! yet".

use std::time::Duration;

use async_trait::async_trait;
use warden_engine::taskrunner::{GuestAgent, TaskRunError};

const DEFAULT_AGENT_PORT: u16 = 8000;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct HttpGuestAgent {
    client: reqwest::Client,
    port: u16,
}

impl Default for HttpGuestAgent {
    fn default() -> Self {
        HttpGuestAgent { client: reqwest::Client::new(), port: DEFAULT_AGENT_PORT }
    }
}

impl HttpGuestAgent {
    pub fn new() -> Self {
        HttpGuestAgent::default()
    }

    pub fn with_port(port: u16) -> Self {
        HttpGuestAgent { client: reqwest::Client::new(), port }
    }
}

#[async_trait]
impl GuestAgent for HttpGuestAgent {
    async fn wait_online(&self, ip: &str, timeout: Duration) -> Result<(), TaskRunError> {
        let url = format!("http://{ip}:{}/status", self.port);
        let deadline = tokio::time::Instant::now() + timeout;

        while tokio::time::Instant::now() < deadline {
            if let Ok(resp) = self.client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(TaskRunError::AgentTimeout(ip.to_string()))
    }
}

#[cfg(test)]
#[path = "guest_agent_tests.rs"]
mod tests;
