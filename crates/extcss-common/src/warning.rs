//! De-duplicated warnings.
//!
//! Loop guards fire on every reapplication cycle once they trip, so the same
//! diagnostic would otherwise be logged many times per second. A [`Warnings`]
//! log emits each `(component, message)` pair once until it is cleared.
//! Every owner keeps its own log, so clearing one never re-arms another's.

use std::collections::HashSet;

/// Set of warnings already emitted by one owner.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    seen: HashSet<String>,
}

impl Warnings {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a warning through `log::warn!` once per unique message.
    ///
    /// Returns `true` if the message was emitted, `false` if it was a duplicate.
    ///
    /// # Example
    /// ```
    /// use extcss_common::warning::Warnings;
    ///
    /// let mut warnings = Warnings::new();
    /// assert!(warnings.warn_once("engine", "style protection limit reached for #ad"));
    /// assert!(!warnings.warn_once("engine", "style protection limit reached for #ad"));
    /// ```
    pub fn warn_once(&mut self, component: &str, message: &str) -> bool {
        let key = format!("[{component}] {message}");
        if self.seen.contains(&key) {
            return false;
        }
        log::warn!(target: "extcss", "{key}");
        let _ = self.seen.insert(key);
        true
    }

    /// Number of distinct warnings emitted since the last clear.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True if nothing has been emitted since the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget everything emitted so far.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
