// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot schema migrations, so an older on-disk snapshot can still be
//! loaded by a newer daemon build.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot is version {0}, newer than this build's {1}")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
}

/// A single version-to-version snapshot transform.
pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError>;
}

#[derive(Default)]
pub struct MigrationRegistry {
    pub(crate) migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        MigrationRegistry { migrations: Vec::new() }
    }

    pub fn register(&mut self, migration: Box<dyn Migration>) {
        self.migrations.push(migration);
    }

    /// Walks `snapshot["v"]` forward one migration at a time until it
    /// reaches `target_version`. A snapshot already at `target_version` is
    /// returned unchanged; one newer than `target_version` is rejected —
    /// this build doesn't know how to read the future.
    pub fn migrate_to(&self, mut snapshot: Value, target_version: u32) -> Result<Value, MigrationError> {
        let mut current = snapshot["v"].as_u64().unwrap_or(0) as u32;
        if current == target_version {
            return Ok(snapshot);
        }
        if current > target_version {
            return Err(MigrationError::TooNew(current, target_version));
        }

        while current != target_version {
            let next = self.migrations.iter().find(|m| m.source_version() == current);
            let Some(migration) = next else {
                return Err(MigrationError::NoPath(current, target_version));
            };
            migration.migrate(&mut snapshot)?;
            current = migration.target_version();
            snapshot["v"] = Value::from(current);
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
