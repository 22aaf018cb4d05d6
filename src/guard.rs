//! Synchronous race guard for destructive actions.
//!
//! Actions that are exclusive and irreversible, like permanently deleting
//! a record, must decide whether they are the first invocation before any
//! asynchronous work begins. Otherwise a double-click starts the action
//! twice, with both invocations past the check by the time either write
//! lands. [`OneShotGuard`] is that decision as an owned value: the first
//! [`try_engage`](OneShotGuard::try_engage) returns true, every later one
//! returns false until [`reset`](OneShotGuard::reset).

/// One-shot guard for an exclusive, irreversible action.
#[derive(Debug, Default)]
pub struct OneShotGuard {
    engaged: bool,
}

impl OneShotGuard {
    /// Create a disengaged guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engage the guard. Returns true exactly once; callers proceed with
    /// the action only on true. Check and set happen in one synchronous
    /// step, before any await.
    pub fn try_engage(&mut self) -> bool {
        if self.engaged {
            log::debug!("Action guard: already engaged, ignoring");
            return false;
        }
        self.engaged = true;
        true
    }

    /// Check if the guard is engaged.
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Release the guard, e.g. when the guarded action failed and may
    /// legitimately be attempted again.
    pub fn reset(&mut self) {
        self.engaged = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_engage_wins() {
        let mut guard = OneShotGuard::new();
        assert!(guard.try_engage());
        assert!(guard.is_engaged());

        // The double-click case.
        assert!(!guard.try_engage());
        assert!(!guard.try_engage());
    }

    #[test]
    fn test_reset_allows_another_attempt() {
        let mut guard = OneShotGuard::new();
        assert!(guard.try_engage());

        guard.reset();
        assert!(!guard.is_engaged());
        assert!(guard.try_engage());
    }
}
