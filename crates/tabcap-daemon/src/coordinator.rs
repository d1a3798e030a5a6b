//! Event coordinator: serialized notification handling and enforcement.
//!
//! One notification at a time: mutate the registry (or the limit), run a
//! single policy pass over a snapshot, and apply the result through the
//! host adapter. A victim leaves the registry only when the host reports
//! the resulting close back through the ordinary closed path; that close
//! notification is also what triggers the next pass, so a multi-tab
//! overshoot drains one tab per pass.

use chrono::{DateTime, Utc};

use tabcap_core::config::TabLimit;
use tabcap_core::host::HostAdapter;
use tabcap_core::policy::{self, EvictionOutcome, Victim};
use tabcap_core::registry::TabRegistry;
use tabcap_core::types::{EventKind, TabEvent, TabHandle, TabRecord};

use crate::journal::{CoordinatorStats, EvictionJournal, EvictionNote};

// ─── Pass results ─────────────────────────────────────────────────

/// What happened to the policy's victim, if there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseAttempt {
    /// No victim this pass.
    NotNeeded,
    /// Close requested from the host; the matching closed notification
    /// is expected to follow.
    Requested(TabHandle),
    /// The host refused or failed the close; the over-limit condition
    /// stands until the next notification.
    Failed(TabHandle),
}

/// Result of handling one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Policy outcome; absent when the notification did not warrant a
    /// pass (same-value limit update).
    pub outcome: Option<EvictionOutcome>,
    pub close: CloseAttempt,
}

impl PassOutcome {
    fn no_pass() -> Self {
        Self {
            outcome: None,
            close: CloseAttempt::NotNeeded,
        }
    }

    pub fn victim(&self) -> Option<&Victim> {
        self.outcome.as_ref().and_then(|o| o.victim.as_ref())
    }
}

// ─── Coordinator ──────────────────────────────────────────────────

/// Serialized enforcement engine: registry, limit, and pass bookkeeping.
///
/// Single-threaded and deterministic. The caller guarantees one
/// notification at a time; the runtime does so by funnelling everything
/// through a single-consumer queue.
#[derive(Debug)]
pub struct Coordinator {
    registry: TabRegistry,
    limit: TabLimit,
    /// Bumped on every accepted mutation (open, tracked close, limit
    /// change). Cheap "did anything change" signal for clients.
    version: u64,
    journal: EvictionJournal,
    stats: CoordinatorStats,
}

impl Coordinator {
    pub fn new(limit: TabLimit) -> Self {
        Self {
            registry: TabRegistry::new(),
            limit,
            version: 0,
            journal: EvictionJournal::new(),
            stats: CoordinatorStats::default(),
        }
    }

    // ─── Notification handlers ────────────────────────────────────

    /// A tab opened (or re-opened): track it, then enforce.
    pub fn on_tab_opened<A: HostAdapter + ?Sized>(
        &mut self,
        handle: TabHandle,
        now: DateTime<Utc>,
        host: &A,
    ) -> PassOutcome {
        self.stats.events += 1;
        self.registry.record_open(handle, now);
        self.version += 1;
        self.run_pass(EventKind::Opened, now, host)
    }

    /// A tab closed: untrack it, then enforce. The pass matters even
    /// here: close notifications are how pending overshoot drains, and
    /// an unknown handle still counts as a trigger.
    pub fn on_tab_closed<A: HostAdapter + ?Sized>(
        &mut self,
        handle: &TabHandle,
        now: DateTime<Utc>,
        host: &A,
    ) -> PassOutcome {
        self.stats.events += 1;
        if self.registry.record_close(handle) {
            self.version += 1;
        } else {
            self.stats.ignored_closes += 1;
        }
        self.run_pass(EventKind::Closed, now, host)
    }

    /// The cap changed: store it, then enforce. A same-value update is
    /// not a change and runs no pass.
    pub fn on_limit_changed<A: HostAdapter + ?Sized>(
        &mut self,
        max_tabs: i64,
        now: DateTime<Utc>,
        host: &A,
    ) -> PassOutcome {
        self.stats.events += 1;
        if !self.limit.update(max_tabs) {
            return PassOutcome::no_pass();
        }
        self.version += 1;
        self.run_pass(EventKind::LimitChanged, now, host)
    }

    /// Dispatcher for the runtime's event loop.
    pub fn apply<A: HostAdapter + ?Sized>(
        &mut self,
        event: TabEvent,
        now: DateTime<Utc>,
        host: &A,
    ) -> PassOutcome {
        match event {
            TabEvent::Opened { handle } => self.on_tab_opened(handle, now, host),
            TabEvent::Closed { handle } => self.on_tab_closed(&handle, now, host),
            TabEvent::LimitChanged { max_tabs } => self.on_limit_changed(max_tabs, now, host),
        }
    }

    // ─── Enforcement ──────────────────────────────────────────────

    fn run_pass<A: HostAdapter + ?Sized>(
        &mut self,
        trigger: EventKind,
        now: DateTime<Utc>,
        host: &A,
    ) -> PassOutcome {
        self.stats.passes += 1;
        let snapshot = self.registry.snapshot();
        let outcome = policy::evaluate(&snapshot, self.limit.max_tabs, host);
        self.stats.skipped_dirty += outcome.skipped_dirty as u64;
        self.stats.skipped_unqueryable += outcome.skipped_unqueryable as u64;

        let close = match &outcome.victim {
            None => CloseAttempt::NotNeeded,
            // The policy just confirmed the victim clean, so unsaved
            // changes cannot be lost by discarding.
            Some(victim) => match host.close(&victim.handle, true) {
                Ok(()) => {
                    self.stats.evictions += 1;
                    self.journal.push(EvictionNote {
                        version: self.version,
                        handle: victim.handle.clone(),
                        opened_at: victim.opened_at,
                        preview: victim.preview,
                        evicted_at: now,
                        trigger,
                    });
                    CloseAttempt::Requested(victim.handle.clone())
                }
                Err(_) => {
                    self.stats.close_failures += 1;
                    CloseAttempt::Failed(victim.handle.clone())
                }
            },
        };

        PassOutcome {
            outcome: Some(outcome),
            close,
        }
    }

    // ─── Read side ────────────────────────────────────────────────

    pub fn snapshot(&self) -> Vec<TabRecord> {
        self.registry.snapshot()
    }

    pub fn contains(&self, handle: &TabHandle) -> bool {
        self.registry.contains(handle)
    }

    pub fn open_tabs(&self) -> usize {
        self.registry.len()
    }

    pub fn limit(&self) -> TabLimit {
        self.limit
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    pub fn recent_evictions(&self) -> &[EvictionNote] {
        self.journal.recent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tabcap_core::host::HostError;

    /// Scripted host: static pinned/preview sets, mutable dirty set, and
    /// a close log so tests can watch what the engine asked for.
    #[derive(Default)]
    struct FakeHost {
        pinned: HashSet<String>,
        preview: HashSet<String>,
        dirty: Mutex<HashSet<String>>,
        fail_close: HashSet<String>,
        closes: Mutex<Vec<String>>,
    }

    impl FakeHost {
        fn new() -> Self {
            Self::default()
        }

        fn with_pinned(mut self, handle: &str) -> Self {
            self.pinned.insert(handle.to_string());
            self
        }

        fn with_preview(mut self, handle: &str) -> Self {
            self.preview.insert(handle.to_string());
            self
        }

        fn with_dirty(self, handle: &str) -> Self {
            self.dirty.lock().expect("lock").insert(handle.to_string());
            self
        }

        fn with_close_error(mut self, handle: &str) -> Self {
            self.fail_close.insert(handle.to_string());
            self
        }

        fn set_dirty(&self, handle: &str, dirty: bool) {
            let mut set = self.dirty.lock().expect("lock");
            if dirty {
                set.insert(handle.to_string());
            } else {
                set.remove(handle);
            }
        }

        fn closes(&self) -> Vec<String> {
            self.closes.lock().expect("lock").clone()
        }
    }

    impl HostAdapter for FakeHost {
        fn is_pinned(&self, handle: &TabHandle) -> Result<bool, HostError> {
            Ok(self.pinned.contains(handle.as_str()))
        }

        fn is_dirty(&self, handle: &TabHandle) -> Result<bool, HostError> {
            Ok(self.dirty.lock().expect("lock").contains(handle.as_str()))
        }

        fn is_preview(&self, handle: &TabHandle) -> Result<bool, HostError> {
            Ok(self.preview.contains(handle.as_str()))
        }

        fn close(&self, handle: &TabHandle, _discard_unsaved: bool) -> Result<(), HostError> {
            if self.fail_close.contains(handle.as_str()) {
                return Err(HostError::CloseRejected(handle.as_str().to_string()));
            }
            self.closes
                .lock()
                .expect("lock")
                .push(handle.as_str().to_string());
            Ok(())
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid")
            .with_timezone(&Utc)
    }

    fn h(s: &str) -> TabHandle {
        TabHandle::new(s)
    }

    fn requested(outcome: &PassOutcome) -> &str {
        match &outcome.close {
            CloseAttempt::Requested(handle) => handle.as_str(),
            other => panic!("expected a close request, got {other:?}"),
        }
    }

    #[test]
    fn third_open_over_limit_two_evicts_oldest() {
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(2));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);
        let pass = coord.on_tab_opened(h("c"), ts("2026-03-01T09:02:00Z"), &host);

        assert_eq!(requested(&pass), "a");
        assert_eq!(host.closes(), vec!["a"]);
        // Not untracked yet: the host's closed notification does that.
        assert_eq!(coord.open_tabs(), 3);
    }

    #[test]
    fn preview_tab_evicted_at_limit_one() {
        let host = FakeHost::new().with_preview("a");
        let mut coord = Coordinator::new(TabLimit::new(1));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        let pass = coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);

        assert_eq!(requested(&pass), "a");
        assert!(pass.victim().expect("victim").preview);
    }

    #[test]
    fn newest_preview_outranks_older_plain_tabs() {
        let host = FakeHost::new().with_preview("c");
        let mut coord = Coordinator::new(TabLimit::new(2));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);
        let pass = coord.on_tab_opened(h("c"), ts("2026-03-01T09:02:00Z"), &host);

        assert_eq!(requested(&pass), "c");
    }

    #[test]
    fn pinned_tab_survives_limit_zero() {
        let host = FakeHost::new().with_pinned("a");
        let mut coord = Coordinator::new(TabLimit::new(0));

        let pass = coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);

        assert_eq!(pass.close, CloseAttempt::NotNeeded);
        assert_eq!(coord.open_tabs(), 1);
        assert_eq!(coord.stats().evictions, 0);
    }

    #[test]
    fn eviction_completes_via_host_close_notification() {
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(1));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);
        assert_eq!(coord.open_tabs(), 2);

        let pass = coord.on_tab_closed(&h("a"), ts("2026-03-01T09:01:01Z"), &host);

        assert_eq!(coord.open_tabs(), 1);
        assert_eq!(pass.close, CloseAttempt::NotNeeded);
    }

    #[test]
    fn overshoot_drains_one_tab_per_pass() {
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(1));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        let pass = coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);
        assert_eq!(requested(&pass), "a");

        coord.on_tab_closed(&h("a"), ts("2026-03-01T09:01:01Z"), &host);
        coord.on_tab_opened(h("c"), ts("2026-03-01T09:02:00Z"), &host);
        coord.on_tab_closed(&h("b"), ts("2026-03-01T09:02:01Z"), &host);
        coord.on_tab_opened(h("d"), ts("2026-03-01T09:03:00Z"), &host);
        coord.on_tab_closed(&h("c"), ts("2026-03-01T09:03:01Z"), &host);

        assert_eq!(host.closes(), vec!["a", "b", "c"]);
        let snapshot = coord.snapshot();
        let remaining: Vec<&str> = snapshot.iter().map(|r| r.handle.as_str()).collect();
        assert_eq!(remaining, vec!["d"]);
    }

    #[test]
    fn pending_victim_reselected_until_close_arrives() {
        // The engine keeps no pending-close state: if the host has not
        // reported the close yet, the next pass picks the same victim
        // again and asks again.
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(1));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);
        coord.on_tab_opened(h("c"), ts("2026-03-01T09:02:00Z"), &host);

        assert_eq!(host.closes(), vec!["a", "a"]);
    }

    #[test]
    fn close_failure_leaves_condition_in_place() {
        let host = FakeHost::new().with_close_error("a");
        let mut coord = Coordinator::new(TabLimit::new(1));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        let pass = coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);

        assert_eq!(pass.close, CloseAttempt::Failed(h("a")));
        assert_eq!(coord.open_tabs(), 2);
        assert_eq!(coord.stats().close_failures, 1);
        assert!(host.closes().is_empty());

        // Next trigger retries the same victim and fails the same way.
        let retry = coord.on_tab_closed(&h("ghost"), ts("2026-03-01T09:02:00Z"), &host);
        assert_eq!(retry.close, CloseAttempt::Failed(h("a")));
        assert_eq!(coord.stats().close_failures, 2);
    }

    #[test]
    fn same_value_limit_update_runs_no_pass() {
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(2));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        let passes_before = coord.stats().passes;

        let pass = coord.on_limit_changed(2, ts("2026-03-01T09:01:00Z"), &host);

        assert!(pass.outcome.is_none());
        assert_eq!(coord.stats().passes, passes_before);
    }

    #[test]
    fn lowered_limit_evicts_immediately() {
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(3));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);
        coord.on_tab_opened(h("c"), ts("2026-03-01T09:02:00Z"), &host);
        assert!(host.closes().is_empty());

        let pass = coord.on_limit_changed(2, ts("2026-03-01T09:03:00Z"), &host);

        assert_eq!(requested(&pass), "a");
        assert_eq!(coord.limit().max_tabs, 2);
    }

    #[test]
    fn raised_limit_clears_pressure() {
        let host = FakeHost::new().with_dirty("a").with_dirty("b");
        let mut coord = Coordinator::new(TabLimit::new(1));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        let stuck = coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);
        assert_eq!(stuck.close, CloseAttempt::NotNeeded);
        assert!(stuck.outcome.expect("pass").over_limit);

        let pass = coord.on_limit_changed(5, ts("2026-03-01T09:02:00Z"), &host);
        assert!(!pass.outcome.expect("pass").over_limit);
    }

    #[test]
    fn unknown_close_counts_and_still_triggers_a_pass() {
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(1));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);

        let pass = coord.on_tab_closed(&h("ghost"), ts("2026-03-01T09:02:00Z"), &host);

        assert_eq!(coord.stats().ignored_closes, 1);
        // Registry untouched, so the pending overshoot is re-requested.
        assert_eq!(requested(&pass), "a");
    }

    #[test]
    fn duplicate_open_demotes_tab_in_age_order() {
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(2));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);
        // Re-open refreshes "a", making "b" the oldest.
        coord.on_tab_opened(h("a"), ts("2026-03-01T09:05:00Z"), &host);
        assert_eq!(coord.open_tabs(), 2);

        let pass = coord.on_tab_opened(h("c"), ts("2026-03-01T09:06:00Z"), &host);
        assert_eq!(requested(&pass), "b");
    }

    #[test]
    fn dirty_overshoot_resolves_once_tab_is_saved() {
        let host = FakeHost::new().with_dirty("a").with_dirty("b");
        let mut coord = Coordinator::new(TabLimit::new(1));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        let stuck = coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);
        assert_eq!(stuck.close, CloseAttempt::NotNeeded);

        host.set_dirty("a", false);
        let pass = coord.on_tab_closed(&h("ghost"), ts("2026-03-01T09:02:00Z"), &host);

        assert_eq!(requested(&pass), "a");
    }

    #[test]
    fn journal_and_stats_track_evictions() {
        let host = FakeHost::new().with_preview("a");
        let mut coord = Coordinator::new(TabLimit::new(1));

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        coord.on_tab_opened(h("b"), ts("2026-03-01T09:01:00Z"), &host);

        let stats = coord.stats();
        assert_eq!(stats.events, 2);
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.evictions, 1);

        let notes = coord.recent_evictions();
        assert_eq!(notes.len(), 1);
        let note = &notes[0];
        assert_eq!(note.handle, h("a"));
        assert!(note.preview);
        assert_eq!(note.trigger, EventKind::Opened);
        assert_eq!(note.opened_at, ts("2026-03-01T09:00:00Z"));
        assert_eq!(note.evicted_at, ts("2026-03-01T09:01:00Z"));
    }

    #[test]
    fn apply_dispatches_by_event_kind() {
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(2));
        let now = ts("2026-03-01T09:00:00Z");

        coord.apply(TabEvent::Opened { handle: h("a") }, now, &host);
        coord.apply(TabEvent::LimitChanged { max_tabs: 0 }, now, &host);

        assert_eq!(host.closes(), vec!["a"]);
        coord.apply(TabEvent::Closed { handle: h("a") }, now, &host);
        assert_eq!(coord.open_tabs(), 0);
    }

    #[test]
    fn version_advances_on_mutations_only() {
        let host = FakeHost::new();
        let mut coord = Coordinator::new(TabLimit::new(2));
        assert_eq!(coord.version(), 0);

        coord.on_tab_opened(h("a"), ts("2026-03-01T09:00:00Z"), &host);
        assert_eq!(coord.version(), 1);

        coord.on_limit_changed(2, ts("2026-03-01T09:01:00Z"), &host);
        assert_eq!(coord.version(), 1);

        coord.on_tab_closed(&h("ghost"), ts("2026-03-01T09:02:00Z"), &host);
        assert_eq!(coord.version(), 1);

        coord.on_tab_closed(&h("a"), ts("2026-03-01T09:03:00Z"), &host);
        assert_eq!(coord.version(), 2);
    }
}
