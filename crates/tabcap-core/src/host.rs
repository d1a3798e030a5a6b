//! Host adapter boundary: how the engine asks the editor about its tabs.
//!
//! Defined here (pure, no async) as a synchronous trait. The subprocess
//! bridge lives in tabcap-host; tests use hand-rolled fakes.

use thiserror::Error;

use crate::types::TabHandle;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host query failed: {0}")]
    QueryFailed(String),
    #[error("host rejected close: {0}")]
    CloseRejected(String),
    #[error("malformed host reply: {0}")]
    MalformedReply(String),
    #[error("host io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Synchronous view of the host editor, queried per candidate during an
/// enforcement pass.
///
/// Calls are expected to be fast. Failures are per-call: the policy skips
/// the affected candidate (pinned/dirty) or assumes not-preview (preview)
/// instead of aborting the pass.
pub trait HostAdapter: Send + Sync {
    /// Whether the user pinned this tab. Pinned tabs are never evicted
    /// and never count toward the limit.
    fn is_pinned(&self, handle: &TabHandle) -> Result<bool, HostError>;

    /// Whether the tab has unsaved changes. Dirty tabs are never evicted.
    fn is_dirty(&self, handle: &TabHandle) -> Result<bool, HostError>;

    /// Whether the tab is a provisional preview tab. Previews evict first.
    fn is_preview(&self, handle: &TabHandle) -> Result<bool, HostError>;

    /// Ask the host to close the tab. The engine only closes tabs it has
    /// just confirmed clean, so it always passes `discard_unsaved: true`.
    fn close(&self, handle: &TabHandle, discard_unsaved: bool) -> Result<(), HostError>;
}

impl<T: HostAdapter + ?Sized> HostAdapter for &T {
    fn is_pinned(&self, handle: &TabHandle) -> Result<bool, HostError> {
        (**self).is_pinned(handle)
    }

    fn is_dirty(&self, handle: &TabHandle) -> Result<bool, HostError> {
        (**self).is_dirty(handle)
    }

    fn is_preview(&self, handle: &TabHandle) -> Result<bool, HostError> {
        (**self).is_preview(handle)
    }

    fn close(&self, handle: &TabHandle, discard_unsaved: bool) -> Result<(), HostError> {
        (**self).close(handle, discard_unsaved)
    }
}
