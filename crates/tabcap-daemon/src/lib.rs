//! tabcap-daemon: event coordinator and enforcement bookkeeping.
//! Applies host notifications one at a time, runs a single policy pass
//! per notification, and applies close decisions through the host
//! adapter. Pure and synchronous; the runtime supplies the queueing.

pub mod coordinator;
pub mod journal;

pub use coordinator::{CloseAttempt, Coordinator, PassOutcome};
pub use journal::{CoordinatorStats, EvictionJournal, EvictionNote, JOURNAL_CAP};

pub use tabcap_core::types;
