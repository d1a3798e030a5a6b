//! Open-tab registry: which tabs are open and when each was opened.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{TabHandle, TabRecord};

/// Registry of currently open tabs.
///
/// Membership defines open-ness. Pinned/dirty/preview flags are never
/// stored here; they change outside our view and are queried live from
/// the host at decision time.
#[derive(Debug, Clone, Default)]
pub struct TabRegistry {
    map: HashMap<TabHandle, DateTime<Utc>>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tab as open.
    ///
    /// A handle that is already tracked has its timestamp overwritten:
    /// a duplicate open means the host considers it opened now.
    pub fn record_open(&mut self, handle: TabHandle, at: DateTime<Utc>) {
        self.map.insert(handle, at);
    }

    /// Record a tab as closed. Unknown handles are a no-op; returns
    /// whether the handle was actually tracked.
    pub fn record_close(&mut self, handle: &TabHandle) -> bool {
        self.map.remove(handle).is_some()
    }

    pub fn contains(&self, handle: &TabHandle) -> bool {
        self.map.contains_key(handle)
    }

    pub fn opened_at(&self, handle: &TabHandle) -> Option<DateTime<Utc>> {
        self.map.get(handle).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Point-in-time copy for one enforcement pass.
    ///
    /// Sorted by handle so listings and tests are stable; storage order
    /// carries no meaning.
    pub fn snapshot(&self) -> Vec<TabRecord> {
        let mut records: Vec<TabRecord> = self
            .map
            .iter()
            .map(|(handle, opened_at)| TabRecord {
                handle: handle.clone(),
                opened_at: *opened_at,
            })
            .collect();
        records.sort_by(|a, b| a.handle.cmp(&b.handle));
        records
    }
}
