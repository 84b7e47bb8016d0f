//! Request tokens for discarding superseded responses.
//!
//! Each fetch takes a token before it starts. When it completes, its result is only
//! accepted if no later fetch has started in the meantime.

use std::sync::atomic::{AtomicU64, Ordering};

/// Token handed out by [`RequestSequencer::issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

/// Issues increasing request tokens.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    /// Creates a sequencer that has issued nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
        }
    }

    /// Starts a new request, superseding every earlier one.
    pub fn issue(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `token` belongs to the most recently started request.
    #[must_use]
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::Acquire) == token.0
    }

    /// Passes `value` through only when `token` is still current.
    pub fn settle<T>(&self, token: RequestToken, value: T) -> Option<T> {
        self.is_current(token).then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_token_wins() {
        let sequencer = RequestSequencer::new();
        let first = sequencer.issue();
        let second = sequencer.issue();

        assert!(first < second);
        assert!(!sequencer.is_current(first));
        assert_eq!(sequencer.settle(first, "old"), None);
        assert_eq!(sequencer.settle(second, "new"), Some("new"));
    }

    #[test]
    fn test_settle_does_not_consume() {
        let sequencer = RequestSequencer::default();
        let token = sequencer.issue();
        assert_eq!(sequencer.settle(token, 1), Some(1));
        assert_eq!(sequencer.settle(token, 2), Some(2));
    }
}
