// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Analysis submission settings: the machine/platform/tag selection rules
//! validated at the submission boundary and consumed by task creation (§4.6).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// One explicit platform/OS/tag selection entry in `settings.platforms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSelection {
    pub platform: String,
    pub os_version: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl PlatformSelection {
    pub fn new(platform: impl Into<String>, os_version: impl Into<String>) -> Self {
        Self { platform: platform.into(), os_version: os_version.into(), tags: BTreeSet::new() }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Canonicalised, sorted, comma-joined tag list — the form stored on queued
    /// task records and hashed into the dependency hash (§4.2, §3).
    pub fn tags_canonical(&self) -> String {
        self.tags.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

crate::builder! {
    pub struct SettingsBuilder => Settings {
        set { timeout: u32 = 120 }
        set { manual: bool = false }
        set { enforce_timeout: bool = false }
        set { memory_dump: bool = false }
        option { extraction_path: String = None }
        computed { options: BTreeMap<String, String> = BTreeMap::new() }
        computed { machines: Vec<String> = Vec::new() }
        computed { platforms: Vec<PlatformSelection> = Vec::new() }
        computed { machine_tags: BTreeSet<String> = BTreeSet::new() }
    }
}

/// Per-analysis execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub timeout: u32,
    pub manual: bool,
    pub enforce_timeout: bool,
    pub memory_dump: bool,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub machines: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<PlatformSelection>,
    /// Analysis-wide machine tags. Merged into each `platforms[i].tags` entry by
    /// [`Settings::normalize`] at submission time; the scheduler never reads this
    /// field directly afterwards (see DESIGN.md open-question decision #2).
    #[serde(default)]
    pub machine_tags: BTreeSet<String>,
    pub extraction_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            timeout: 120,
            manual: false,
            enforce_timeout: false,
            memory_dump: false,
            options: BTreeMap::new(),
            machines: Vec::new(),
            platforms: Vec::new(),
            machine_tags: BTreeSet::new(),
            extraction_path: None,
        }
    }
}

impl Settings {
    /// B2: specifying both explicit machines and (platforms or machine_tags) is invalid.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.machines.is_empty() && (!self.platforms.is_empty() || !self.machine_tags.is_empty())
        {
            return Err(CoreError::Validation(
                "settings.machines cannot be combined with platforms or machine_tags".into(),
            ));
        }
        Ok(())
    }

    /// Merge `machine_tags` into every platform entry's tags, once, at submission
    /// time. Idempotent: calling it twice is a no-op since the tags are already
    /// present the second time.
    pub fn normalize(&mut self) {
        if self.machine_tags.is_empty() {
            return;
        }
        for platform in &mut self.platforms {
            platform.tags.extend(self.machine_tags.iter().cloned());
        }
    }
}

/// A user-submitted or identified analysis target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Target {
    File {
        path: String,
        sha256: String,
        filename: String,
        #[serde(default)]
        media_type: Option<String>,
    },
    Url {
        url: String,
    },
}

impl Target {
    pub fn category(&self) -> Category {
        match self {
            Target::File { .. } => Category::File,
            Target::Url { .. } => Category::Url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    File,
    Url,
}

crate::simple_display! {
    Category {
        File => "file",
        Url => "url",
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
