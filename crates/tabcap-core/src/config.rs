//! Tab limit configuration.

use serde::{Deserialize, Serialize};

/// Cap applied when the daemon starts without an explicit `--max-tabs`.
pub const DEFAULT_MAX_TABS: i64 = 10;

/// Current cap on simultaneously open, non-pinned tabs.
///
/// Zero and negative values are legal and mean every eligible candidate
/// is over the cap; enforcement then drains one tab per pass until no
/// clean candidate remains. No floor or clamping is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabLimit {
    pub max_tabs: i64,
}

impl TabLimit {
    pub fn new(max_tabs: i64) -> Self {
        Self { max_tabs }
    }

    /// Apply an update, returning whether the stored value changed.
    ///
    /// A same-value update is not a change and must not trigger an
    /// enforcement pass.
    pub fn update(&mut self, max_tabs: i64) -> bool {
        if self.max_tabs == max_tabs {
            return false;
        }
        self.max_tabs = max_tabs;
        true
    }
}

impl Default for TabLimit {
    fn default() -> Self {
        Self {
            max_tabs: DEFAULT_MAX_TABS,
        }
    }
}
