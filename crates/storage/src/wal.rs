// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log of [`sift_core::Event`]s.
//!
//! Every mutation to [`crate::state::MaterializedState`] is first durably
//! appended here, then applied in memory. Recovery replays unprocessed
//! entries (those past the last snapshot's `seq`) back through `apply_event`.
//! The log tolerates a truncated or corrupted tail — a crash mid-write
//! must never prevent the daemon from starting — by rotating the corrupt
//! suffix aside into a numbered `.bak` file and continuing with the valid
//! prefix.

use serde::{Deserialize, Serialize};
use sift_core::Event;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Flush is forced once this many entries have been appended without one.
const FLUSH_THRESHOLD: usize = 100;
/// Number of rotated backups kept (`.bak`, `.bak.2`, `.bak.3`).
const MAX_BACKUPS: u8 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

struct LineSpan {
    seq: u64,
    start: u64,
    end: u64,
}

pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
    processed_seq: u64,
    read_pos: u64,
    unflushed_count: usize,
}

impl Wal {
    /// Open (creating if absent) the WAL at `path`. `processed_seq` is the
    /// sequence number the last snapshot was taken at; `next_unprocessed`
    /// starts returning entries strictly after it.
    ///
    /// If the tail of the file fails to parse, it is rotated aside into a
    /// `.bak` file (oldest backups evicted beyond [`MAX_BACKUPS`]) and the
    /// live file is truncated to its last valid entry.
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            File::create(&path)?;
        }

        let contents = fs::read(&path)?;
        let (spans, corrupt_at) = scan_entries(&contents);

        if let Some(corrupt_at) = corrupt_at {
            rotate_backups(&path)?;
            fs::copy(&path, path.with_extension("bak"))?;
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(corrupt_at)?;
        }

        let write_seq = spans.last().map(|s| s.seq).unwrap_or(0);
        let read_pos = spans
            .iter()
            .find(|s| s.seq > processed_seq)
            .map(|s| s.start)
            .unwrap_or_else(|| corrupt_at.unwrap_or(contents.len() as u64));

        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            write_seq,
            processed_seq,
            read_pos,
            unflushed_count: 0,
        })
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// Append `event`, returning its assigned sequence number. Buffered;
    /// call [`Self::flush`] (or wait for [`Self::needs_flush`]) to
    /// guarantee durability.
    pub fn append(&mut self, event: &Event) -> io::Result<u64> {
        let seq = self.write_seq + 1;
        let entry = WalEntry { seq, event: event.clone() };
        let line = serde_json::to_string(&entry)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.write_seq = seq;
        self.unflushed_count += 1;
        Ok(seq)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.unflushed_count = 0;
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.unflushed_count >= FLUSH_THRESHOLD
    }

    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    /// Read and advance past the next entry after the internal read
    /// cursor. Returns `Ok(None)` at EOF *or* when the next line fails to
    /// parse — the cursor still advances past a bad line so a later call
    /// can recover once a valid entry follows it.
    pub fn next_unprocessed(&mut self) -> io::Result<Option<WalEntry>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.read_pos))?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        self.read_pos += n as u64;

        match parse_line(&line) {
            Some(entry) => Ok(Some(entry)),
            None => Ok(None),
        }
    }

    /// All valid entries strictly after `seq`, stopping at (and
    /// discarding) the first unparseable line rather than erroring.
    #[allow(clippy::expect_used)]
    pub fn entries_after(&self, seq: u64) -> io::Result<Vec<WalEntry>> {
        let contents = fs::read(&self.path)?;
        let (spans, _) = scan_entries(&contents);
        // scan_entries only emits spans it has already parsed successfully.
        Ok(spans
            .into_iter()
            .filter(|s| s.seq > seq)
            .map(|s| parse_line(&contents[s.start as usize..s.end as usize]).expect("span was pre-validated"))
            .collect())
    }

    /// Drop all entries with `seq < keep_from` from the live file, used
    /// after a snapshot makes them unnecessary for recovery.
    pub fn truncate_before(&mut self, keep_from: u64) -> io::Result<()> {
        self.flush()?;
        let contents = fs::read(&self.path)?;
        let (spans, corrupt_at) = scan_entries(&contents);
        let keep_start = spans
            .iter()
            .find(|s| s.seq >= keep_from)
            .map(|s| s.start)
            .unwrap_or_else(|| corrupt_at.unwrap_or(contents.len() as u64));
        let keep_end = corrupt_at.unwrap_or(contents.len() as u64);

        let mut file = OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        file.write_all(&contents[keep_start as usize..keep_end as usize])?;
        file.flush()?;
        drop(file);

        self.writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        self.read_pos = self.read_pos.saturating_sub(keep_start).min(keep_end - keep_start);
        Ok(())
    }

    /// Rewrite the log keeping only entries for which `keep` returns
    /// true, used by `delete_on_startup` (§6) to drop one namespace's
    /// history while leaving the rest replayable. Must be called before
    /// the state it backs has replayed anything from this file.
    pub fn retain(&mut self, keep: impl Fn(&Event) -> bool) -> io::Result<()> {
        self.flush()?;
        let contents = fs::read(&self.path)?;
        let (spans, _corrupt_at) = scan_entries(&contents);

        let kept: Vec<WalEntry> = spans
            .iter()
            .map(|s| parse_line(&contents[s.start as usize..s.end as usize]).expect("span was pre-validated"))
            .filter(|entry| keep(&entry.event))
            .collect();

        let mut file = OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        for entry in &kept {
            let line = serde_json::to_string(entry)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        drop(file);

        self.writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        self.write_seq = kept.last().map(|e| e.seq).unwrap_or(0);
        self.read_pos = 0;
        self.processed_seq = 0;
        self.unflushed_count = 0;
        Ok(())
    }

    /// Truncate the live file to empty and restart sequencing from zero,
    /// used by `reset_on_startup` (§6) before any events are replayed.
    pub fn reset(&mut self) -> io::Result<()> {
        let file = OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        self.writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        drop(file);
        self.write_seq = 0;
        self.processed_seq = 0;
        self.read_pos = 0;
        self.unflushed_count = 0;
        Ok(())
    }
}

fn parse_line(line: &[u8]) -> Option<WalEntry> {
    let text = std::str::from_utf8(line).ok()?;
    let text = text.trim_end_matches('\n');
    if text.is_empty() {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// Scan `contents` line by line, returning the spans of every
/// consecutively-valid entry from the start of the file and the byte
/// offset at which the first invalid (or binary) line begins, if any.
fn scan_entries(contents: &[u8]) -> (Vec<LineSpan>, Option<u64>) {
    let mut spans = Vec::new();
    let mut pos: u64 = 0;
    let mut reader = contents;
    loop {
        let line_start = pos;
        let newline_rel = reader.iter().position(|&b| b == b'\n');
        let (line, consumed) = match newline_rel {
            Some(idx) => (&reader[..idx], idx + 1),
            None => {
                if reader.is_empty() {
                    return (spans, None);
                }
                (reader, reader.len())
            }
        };

        match parse_line(line) {
            Some(entry) => {
                pos += consumed as u64;
                spans.push(LineSpan { seq: entry.seq, start: line_start, end: pos });
                reader = &reader[consumed..];
                if reader.is_empty() {
                    return (spans, None);
                }
            }
            None => return (spans, Some(line_start)),
        }
    }
}

/// Rotate `<path>.bak` -> `.bak.2` -> `.bak.3`, dropping whatever was in
/// `.bak.3` (capped at [`MAX_BACKUPS`]).
fn rotate_backups(path: &Path) -> io::Result<()> {
    for gen in (1..MAX_BACKUPS).rev() {
        let from = backup_path(path, gen);
        let to = backup_path(path, gen + 1);
        if from.exists() {
            let _ = fs::remove_file(&to);
            fs::rename(&from, &to)?;
        }
    }
    Ok(())
}

fn backup_path(path: &Path, generation: u8) -> PathBuf {
    if generation <= 1 {
        path.with_extension("bak")
    } else {
        path.with_extension(format!("bak.{generation}"))
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
