//! A [`TerminationCriterion`] is the cooperative time budget shared by every layer of a solve call.
//! The pipeline polls it between components, the backends poll it while searching, and whoever
//! spends time reports it through [`TerminationCriterion::record_elapsed`].
//!
//! The most common criterion is [`TimeBudget`], a wall-clock budget. Criteria compose with
//! [`Combinator`] (two criteria) and [`Composite`] (any number of criteria): the result has the
//! smallest remaining time of its children and expires as soon as one child expires.
//!
//! Termination is advisory; it never preempts a running backend. The asynchronous way to stop a
//! running backend is [`SatSolver::interrupt`].
//!
//! [`SatSolver::interrupt`]: crate::sat::backend::SatSolver::interrupt
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

mod cancellation;
mod combinator;
mod elapsed_budget;
mod indefinite;
mod time_budget;

pub use cancellation::CancellationFlag;
pub use combinator::Combinator;
pub use combinator::Composite;
pub use elapsed_budget::ElapsedTimeBudget;
pub use indefinite::Indefinite;
pub use time_budget::TimeBudget;

/// The remaining time reported by criteria that impose no time limit.
pub const UNBOUNDED: f64 = f64::MAX;

/// The central trait that defines a termination criterion. Implementations use interior
/// mutability so a single criterion can be shared by reference across the whole call tree.
pub trait TerminationCriterion: Debug + Send + Sync {
    /// The remaining time in seconds. Never negative; [`UNBOUNDED`] means no limit.
    fn remaining_time(&self) -> f64;

    /// Returns `true` when the work should stop.
    fn has_expired(&self) -> bool {
        self.remaining_time() <= 0.0
    }

    /// Informs the criterion that `seconds` of work have been performed.
    fn record_elapsed(&self, _seconds: f64) {}

    /// The remaining time as a [`Duration`], or `None` when unbounded.
    fn remaining_duration(&self) -> Option<Duration> {
        let remaining = self.remaining_time();
        if remaining >= UNBOUNDED {
            None
        } else {
            Some(Duration::from_secs_f64(remaining.max(0.0)))
        }
    }
}

impl<T: TerminationCriterion + ?Sized> TerminationCriterion for &T {
    fn remaining_time(&self) -> f64 {
        (**self).remaining_time()
    }

    fn has_expired(&self) -> bool {
        (**self).has_expired()
    }

    fn record_elapsed(&self, seconds: f64) {
        (**self).record_elapsed(seconds)
    }
}

impl<T: TerminationCriterion + ?Sized> TerminationCriterion for Box<T> {
    fn remaining_time(&self) -> f64 {
        (**self).remaining_time()
    }

    fn has_expired(&self) -> bool {
        (**self).has_expired()
    }

    fn record_elapsed(&self, seconds: f64) {
        (**self).record_elapsed(seconds)
    }
}

impl<T: TerminationCriterion + ?Sized> TerminationCriterion for Arc<T> {
    fn remaining_time(&self) -> f64 {
        (**self).remaining_time()
    }

    fn has_expired(&self) -> bool {
        (**self).has_expired()
    }

    fn record_elapsed(&self, seconds: f64) {
        (**self).record_elapsed(seconds)
    }
}

impl<T: TerminationCriterion> TerminationCriterion for Option<T> {
    fn remaining_time(&self) -> f64 {
        match self {
            Some(t) => t.remaining_time(),
            None => UNBOUNDED,
        }
    }

    fn has_expired(&self) -> bool {
        match self {
            Some(t) => t.has_expired(),
            None => false,
        }
    }

    fn record_elapsed(&self, seconds: f64) {
        if let Some(t) = self {
            t.record_elapsed(seconds)
        }
    }
}
