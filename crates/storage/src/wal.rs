// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An append-only, line-delimited JSON write-ahead log.
//!
//! Every mutation to an analysis, task, or machine is recorded here before
//! it is reflected in [`crate::state::MaterializedState`] or in the
//! filesystem layout `analysis_store`/`machine_snapshot` maintain — on
//! restart, replaying the log from the last processed sequence number
//! reconstructs exactly the state the daemon had before it stopped.
//!
//! A corrupt tail (partial write from a crash mid-`flush`) is tolerated:
//! `open` rotates the damaged file to a numbered `.bak` and continues with
//! whatever prefix of valid entries it could recover, rather than refusing
//! to start.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::event::StorageEvent;

const FLUSH_THRESHOLD: usize = 100;
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: StorageEvent,
}

pub struct Wal {
    path: PathBuf,
    file: File,
    entries: Vec<WalEntry>,
    cursor: usize,
    disk_read_pos: u64,
    write_seq: u64,
    processed_seq: u64,
    pending_buf: Vec<u8>,
    pending_count: usize,
    last_flush: Instant,
}

impl Wal {
    /// Opens (creating if absent) the log at `path`. `processed_seq` is the
    /// sequence number already reflected in a loaded snapshot — entries at
    /// or below it are skipped by [`Self::next_unprocessed`].
    pub fn open(path: impl Into<PathBuf>, processed_seq: u64) -> StorageResult<Self> {
        let path = path.into();
        if !path.exists() {
            File::create(&path)?;
        }

        let (entries, valid_bytes, corrupted) = scan_valid_entries(&path)?;
        if corrupted {
            rotate_backups(&path)?;
            rewrite_clean(&path, &entries)?;
        }

        let write_seq = entries.last().map(|e| e.seq).unwrap_or(0);
        let file = OpenOptions::new().append(true).open(&path)?;
        let disk_read_pos = if corrupted {
            fs::metadata(&path)?.len()
        } else {
            valid_bytes
        };

        Ok(Wal {
            path,
            file,
            entries,
            cursor: 0,
            disk_read_pos,
            write_seq,
            processed_seq,
            pending_buf: Vec::new(),
            pending_count: 0,
            last_flush: Instant::now(),
        })
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    /// Assigns the next sequence number and buffers the entry for the next
    /// [`Self::flush`]. Visible immediately to [`Self::next_unprocessed`]
    /// and [`Self::entries_after`] even before it reaches disk.
    pub fn append(&mut self, event: &StorageEvent) -> StorageResult<u64> {
        let seq = self.write_seq + 1;
        self.write_seq = seq;
        let entry = WalEntry { seq, event: event.clone() };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        self.pending_buf.extend_from_slice(&line);
        self.pending_count += 1;
        self.entries.push(entry);
        Ok(seq)
    }

    /// Durably writes everything buffered by [`Self::append`] since the
    /// last flush.
    pub fn flush(&mut self) -> StorageResult<()> {
        if !self.pending_buf.is_empty() {
            self.file.write_all(&self.pending_buf)?;
            self.file.sync_data()?;
            self.disk_read_pos += self.pending_buf.len() as u64;
            self.pending_buf.clear();
        }
        self.pending_count = 0;
        self.last_flush = Instant::now();
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.pending_count >= FLUSH_THRESHOLD
            || (self.pending_count > 0 && self.last_flush.elapsed() >= FLUSH_INTERVAL)
    }

    /// Returns the next entry past `processed_seq`, or `None` if there is
    /// nothing new right now. A malformed line encountered on disk (e.g. a
    /// partial write from another process) is treated as "nothing yet, try
    /// again later" rather than an error — the read position still advances
    /// past it so a later, well-formed append isn't permanently blocked.
    pub fn next_unprocessed(&mut self) -> StorageResult<Option<WalEntry>> {
        loop {
            if self.cursor < self.entries.len() {
                let entry = self.entries[self.cursor].clone();
                self.cursor += 1;
                if entry.seq <= self.processed_seq {
                    continue;
                }
                return Ok(Some(entry));
            }

            let mut reader = BufReader::new(File::open(&self.path)?);
            reader.seek(SeekFrom::Start(self.disk_read_pos))?;
            let mut line = Vec::new();
            let n = std::io::BufRead::read_until(&mut reader, b'\n', &mut line)?;
            if n == 0 {
                return Ok(None);
            }
            if !line.ends_with(b"\n") {
                // Incomplete trailing write; don't consume it, it may
                // complete later.
                return Ok(None);
            }
            self.disk_read_pos += line.len() as u64;
            let body = &line[..line.len() - 1];
            match serde_json::from_slice::<WalEntry>(body) {
                Ok(entry) => {
                    self.entries.push(entry.clone());
                    self.cursor = self.entries.len();
                    if entry.seq <= self.processed_seq {
                        continue;
                    }
                    return Ok(Some(entry));
                }
                Err(_) => return Ok(None),
            }
        }
    }

    /// All entries with `seq > after`, scanned fresh from disk. Stops at
    /// the first malformed line rather than erroring, matching
    /// [`Self::next_unprocessed`]'s tolerance for a partial trailing write.
    pub fn entries_after(&self, after: u64) -> StorageResult<Vec<WalEntry>> {
        let (entries, _, _) = scan_valid_entries(&self.path)?;
        Ok(entries.into_iter().filter(|e| e.seq > after).collect())
    }

    /// Drops entries with `seq < keep_from` from the log file, compacting
    /// it after a snapshot has made them redundant.
    pub fn truncate_before(&mut self, keep_from: u64) -> StorageResult<()> {
        let (entries, _, _) = scan_valid_entries(&self.path)?;
        let kept: Vec<WalEntry> = entries.into_iter().filter(|e| e.seq >= keep_from).collect();
        rewrite_clean(&self.path, &kept)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.disk_read_pos = fs::metadata(&self.path)?.len();
        self.entries = kept;
        self.cursor = self.entries.len();
        Ok(())
    }
}

/// Scans `path` from the start, parsing each complete (`\n`-terminated)
/// line as a [`WalEntry`]. Returns the valid entries found, the byte length
/// of the valid prefix, and whether anything after that prefix failed to
/// parse (a malformed line, or an unterminated tail).
fn scan_valid_entries(path: &Path) -> StorageResult<(Vec<WalEntry>, u64, bool)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    let mut valid_bytes: u64 = 0;
    let mut corrupted = false;

    loop {
        let mut line = Vec::new();
        let n = std::io::BufRead::read_until(&mut reader, b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        if !line.ends_with(b"\n") {
            corrupted = true;
            break;
        }
        let body = &line[..line.len() - 1];
        match std::str::from_utf8(body).ok().and_then(|s| serde_json::from_str::<WalEntry>(s).ok()) {
            Some(entry) => {
                valid_bytes += line.len() as u64;
                entries.push(entry);
            }
            None => {
                corrupted = true;
                break;
            }
        }
    }

    Ok((entries, valid_bytes, corrupted))
}

fn rotate_backups(path: &Path) -> std::io::Result<()> {
    let bak = path.with_extension("bak");
    let bak2 = path.with_extension("bak.2");
    let bak3 = path.with_extension("bak.3");

    let _ = fs::remove_file(&bak3);
    if bak2.exists() {
        fs::rename(&bak2, &bak3)?;
    }
    if bak.exists() {
        fs::rename(&bak, &bak2)?;
    }
    fs::copy(path, &bak)?;
    Ok(())
}

fn rewrite_clean(path: &Path, entries: &[WalEntry]) -> StorageResult<()> {
    let mut buf = Vec::new();
    for entry in entries {
        serde_json::to_writer(&mut buf, entry)?;
        buf.push(b'\n');
    }
    let mut f = File::create(path)?;
    f.write_all(&buf)?;
    f.sync_all()?;
    Ok(())
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
