// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration tree (`cuckoo.toml`), loaded once at startup (§10).
//!
//! Mirrors `conf/*.yaml` in spirit: one `Config` struct, serde defaults for
//! every field, and a single validation pass. Rendering/templating the
//! underlying YAML tree is out of scope (§1); only the typed load/validate
//! path for this tool's own `cuckoo.toml` is implemented.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overrides the default `~/.cuckoocwd` working directory.
    pub cwd: Option<PathBuf>,
    pub default_platform: String,
    /// Allow-list applied when identification selects more than one platform.
    pub multi_platform: Vec<String>,
    pub autotag: bool,
    pub processing: ProcessingCounts,
    pub machinery: MachineryConfig,
    pub scheduler: SchedulerConfig,
    pub retriever: RetrieverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cwd: None,
            default_platform: "windows".to_string(),
            multi_platform: Vec::new(),
            autotag: false,
            processing: ProcessingCounts::default(),
            machinery: MachineryConfig::default(),
            scheduler: SchedulerConfig::default(),
            retriever: RetrieverConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingCounts {
    pub identification: u32,
    pub pre: u32,
    pub post: u32,
}

impl Default for ProcessingCounts {
    fn default() -> Self {
        ProcessingCounts { identification: 2, pre: 2, post: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineryConfig {
    /// Async state-transition worker pool size (§4.3, default 2).
    pub worker_count: u32,
}

impl Default for MachineryConfig {
    fn default() -> Self {
        MachineryConfig { worker_count: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Task-starter worker pool size (§4.6, default 1).
    pub task_starter_count: u32,
    /// Periodic wake interval in seconds (§4.6, default 60).
    pub periodic_wake_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig { task_starter_count: 1, periodic_wake_secs: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Result-retriever worker pool size (§4.7, default 4).
    pub worker_count: u32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        RetrieverConfig { worker_count: 4 }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.default_platform.trim().is_empty() {
            return Err(CoreError::Config("default_platform must not be empty".into()));
        }
        if self.machinery.worker_count == 0 {
            return Err(CoreError::Config("machinery.worker_count must be >= 1".into()));
        }
        if self.scheduler.task_starter_count == 0 {
            return Err(CoreError::Config("scheduler.task_starter_count must be >= 1".into()));
        }
        Ok(())
    }

    /// Resolve the effective CWD: the config override, or `~/.cuckoocwd`.
    pub fn resolve_cwd(&self) -> PathBuf {
        self.cwd.clone().unwrap_or_else(|| {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".cuckoocwd")
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
