//! Eviction policy: picks at most one tab to close when the cap is
//! exceeded.
//!
//! Pure selection logic over a registry snapshot. Pinned tabs are
//! invisible to the policy; preview tabs rank first, then oldest first,
//! with handle order as the final deterministic tie-break. Dirty state is
//! queried lazily, only for tabs actually reached in ranked order, and
//! selection stops at the first clean candidate.

use chrono::{DateTime, Utc};

use crate::host::HostAdapter;
use crate::types::{TabHandle, TabRecord};

// ─── Outcome ──────────────────────────────────────────────────────

/// The tab selected for eviction, with the facts that ranked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Victim {
    pub handle: TabHandle,
    pub opened_at: DateTime<Utc>,
    pub preview: bool,
}

/// Result of one enforcement pass over a registry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionOutcome {
    /// Tab to close, if any. At most one per pass; draining a larger
    /// overshoot relies on the resulting close event triggering the next
    /// pass.
    pub victim: Option<Victim>,
    /// Non-pinned tabs counted against the limit this pass.
    pub open_count: usize,
    /// Whether the counted tabs exceeded the limit.
    pub over_limit: bool,
    /// Candidates passed over because the host reported them dirty.
    pub skipped_dirty: usize,
    /// Tabs passed over because a pinned or dirty query failed.
    pub skipped_unqueryable: usize,
}

// ─── Evaluation ───────────────────────────────────────────────────

/// Run one enforcement pass: decide whether a tab must go and which one.
///
/// Never calls `close`; selection and application are separate so the
/// caller controls when (and whether) the host is asked to act.
pub fn evaluate<A: HostAdapter + ?Sized>(
    records: &[TabRecord],
    limit: i64,
    host: &A,
) -> EvictionOutcome {
    let mut outcome = EvictionOutcome::default();

    // Step 1: drop pinned tabs. They are neither candidates nor counted.
    // A failed pinned query excludes the tab from both as well: its state
    // is unknown, and an unknown tab must not push a known one out.
    let mut candidates: Vec<&TabRecord> = Vec::with_capacity(records.len());
    for record in records {
        match host.is_pinned(&record.handle) {
            Ok(true) => {}
            Ok(false) => candidates.push(record),
            Err(_) => outcome.skipped_unqueryable += 1,
        }
    }

    // Step 2: compare the countable set against the limit. Limits at or
    // below zero leave every candidate over.
    outcome.open_count = candidates.len();
    if (candidates.len() as i64) <= limit {
        return outcome;
    }
    outcome.over_limit = true;

    // Step 3: rank. Preview first, then oldest, then handle order so
    // equal inputs always produce the same victim. A failed preview
    // query means not-preview.
    let mut ranked: Vec<(bool, &TabRecord)> = candidates
        .into_iter()
        .map(|record| {
            let preview = host.is_preview(&record.handle).unwrap_or(false);
            (preview, record)
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.opened_at.cmp(&b.1.opened_at))
            .then_with(|| a.1.handle.cmp(&b.1.handle))
    });

    // Step 4: walk in ranked order; the first tab the host confirms
    // clean is the victim. Dirty or unanswerable tabs are skipped.
    for (preview, record) in ranked {
        match host.is_dirty(&record.handle) {
            Ok(false) => {
                outcome.victim = Some(Victim {
                    handle: record.handle.clone(),
                    opened_at: record.opened_at,
                    preview,
                });
                return outcome;
            }
            Ok(true) => outcome.skipped_dirty += 1,
            Err(_) => outcome.skipped_unqueryable += 1,
        }
    }

    // Step 5: no clean candidate. No victim; the cap stays exceeded
    // until a later pass finds one.
    outcome
}
