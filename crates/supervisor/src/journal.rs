// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL journal of the pending table.
//!
//! Every `track` and `remove` is appended as one line of JSON; on startup the
//! journal is replayed to rebuild the in-flight set, then compacted down to
//! the live entries. A truncated trailing line (crash mid-write) is dropped
//! with a warning along with anything after it.

use crate::pending::PendingTable;
use foreman_core::{Envelope, MessageId, WorkerKind};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from journal operations
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One journal line.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum JournalRecord {
    Track {
        kind: WorkerKind,
        envelope: Envelope,
    },
    Remove {
        kind: WorkerKind,
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },
}

/// Durable log of pending-table mutations.
pub struct PendingJournal {
    file: File,
    path: PathBuf,
}

impl PendingJournal {
    /// Open the journal, replay it into a fresh pending table, and compact
    /// the file down to the surviving entries.
    pub fn open(path: &Path, now_ms: u64) -> Result<(Self, PendingTable), JournalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut table = PendingTable::new();
        if path.exists() {
            replay(path, &mut table, now_ms)?;
        }

        // Compact: rewrite only the live entries, then reopen for append.
        {
            let mut fresh = File::create(path)?;
            for (kind, entry) in table.iter_all() {
                let record = JournalRecord::Track { kind, envelope: entry.envelope.clone() };
                serde_json::to_writer(&mut fresh, &record)?;
                fresh.write_all(b"\n")?;
            }
            fresh.sync_all()?;
        }

        let file = OpenOptions::new().append(true).open(path)?;
        Ok((Self { file, path: path.to_owned() }, table))
    }

    /// Append a track record. Callers log and continue on failure.
    pub fn record_track(&mut self, kind: WorkerKind, envelope: &Envelope) -> Result<(), JournalError> {
        self.append(&JournalRecord::Track { kind, envelope: envelope.clone() })
    }

    /// Append a remove record.
    pub fn record_remove(
        &mut self,
        kind: WorkerKind,
        message_id: &MessageId,
    ) -> Result<(), JournalError> {
        self.append(&JournalRecord::Remove { kind, message_id: message_id.clone() })
    }

    pub fn flush(&mut self) -> Result<(), JournalError> {
        self.file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, record: &JournalRecord) -> Result<(), JournalError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Replay journal lines into the table, stopping at the first corrupt line.
fn replay(path: &Path, table: &mut PendingTable, now_ms: u64) -> Result<(), JournalError> {
    let reader = BufReader::new(File::open(path)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: JournalRecord = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = lineno + 1,
                    error = %e,
                    "corrupt journal tail, dropping remainder"
                );
                break;
            }
        };
        match record {
            JournalRecord::Track { kind, envelope } => {
                table.track(kind, envelope, now_ms);
            }
            JournalRecord::Remove { kind, message_id } => {
                table.remove(kind, &message_id);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
