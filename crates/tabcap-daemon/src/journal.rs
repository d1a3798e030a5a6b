//! Enforcement bookkeeping: pass counters and the recent-eviction journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tabcap_core::types::{EventKind, TabHandle};

/// How many recent evictions `status` can report.
pub const JOURNAL_CAP: usize = 32;

/// One applied eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionNote {
    pub version: u64,
    pub handle: TabHandle,
    pub opened_at: DateTime<Utc>,
    pub preview: bool,
    pub evicted_at: DateTime<Utc>,
    pub trigger: EventKind,
}

/// Running counters since daemon start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub events: u64,
    pub passes: u64,
    pub evictions: u64,
    pub close_failures: u64,
    pub skipped_dirty: u64,
    pub skipped_unqueryable: u64,
    pub ignored_closes: u64,
}

/// Capped log of recent evictions, oldest dropped first.
#[derive(Debug, Clone, Default)]
pub struct EvictionJournal {
    notes: Vec<EvictionNote>,
}

impl EvictionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, note: EvictionNote) {
        self.notes.push(note);
        if self.notes.len() > JOURNAL_CAP {
            let excess = self.notes.len() - JOURNAL_CAP;
            self.notes.drain(..excess);
        }
    }

    /// Recent evictions, oldest first.
    pub fn recent(&self) -> &[EvictionNote] {
        &self.notes
    }
}
