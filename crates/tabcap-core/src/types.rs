use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Tab identity ─────────────────────────────────────────────────

/// Opaque host-assigned tab identity.
///
/// The engine never inspects the contents. Handles are compared, hashed,
/// and ordered only so that decisions over equal inputs are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabHandle(String);

impl TabHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Tab record ───────────────────────────────────────────────────

/// One open tab as tracked by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabRecord {
    pub handle: TabHandle,
    pub opened_at: DateTime<Utc>,
}

// ─── Events ───────────────────────────────────────────────────────

/// Host notification, delivered to the coordinator in host order.
///
/// Open events carry no timestamp: hosts never supply times, the
/// coordinator stamps arrival when it dequeues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    Opened { handle: TabHandle },
    Closed { handle: TabHandle },
    LimitChanged { max_tabs: i64 },
}

impl TabEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Opened { .. } => EventKind::Opened,
            Self::Closed { .. } => EventKind::Closed,
            Self::LimitChanged { .. } => EventKind::LimitChanged,
        }
    }
}

/// Which notification kind triggered an enforcement pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Opened,
    Closed,
    LimitChanged,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Closed => "closed",
            Self::LimitChanged => "limit_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
