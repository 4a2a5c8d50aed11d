use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::TerminationCriterion;
use super::UNBOUNDED;

/// A [`TerminationCriterion`] which expires once [`CancellationFlag::cancel`] has been called on
/// any of its clones. Used to turn OS signals or a supervising caller into a budget.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> CancellationFlag {
        CancellationFlag::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// The underlying flag, e.g. for registering it with a signal handler.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl TerminationCriterion for CancellationFlag {
    fn remaining_time(&self) -> f64 {
        if self.is_cancelled() {
            0.0
        } else {
            UNBOUNDED
        }
    }

    fn has_expired(&self) -> bool {
        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationFlag;
    use crate::termination::TerminationCriterion;

    #[test]
    fn cancelling_a_clone_expires_the_original() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.has_expired());
        assert!(flag.remaining_duration().is_none());

        clone.cancel();
        assert!(flag.has_expired());
        assert_eq!(flag.remaining_time(), 0.0);
    }
}
