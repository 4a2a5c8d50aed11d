use std::time::Duration;
use std::time::Instant;

use super::TerminationCriterion;

/// A [`TerminationCriterion`] which expires when the specified wall-clock budget has been used.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    /// The point in time from which to measure the budget.
    started_at: Instant,
    /// The amount of time before [`TimeBudget::has_expired()`] becomes true.
    budget: Duration,
}

impl TimeBudget {
    /// Give the solver a time budget, starting now.
    pub fn starting_now(budget: Duration) -> TimeBudget {
        TimeBudget {
            started_at: Instant::now(),
            budget,
        }
    }

    pub fn from_seconds(seconds: f64) -> TimeBudget {
        TimeBudget::starting_now(Duration::from_secs_f64(seconds.max(0.0)))
    }
}

impl TerminationCriterion for TimeBudget {
    fn remaining_time(&self) -> f64 {
        self.budget
            .saturating_sub(self.started_at.elapsed())
            .as_secs_f64()
    }

    fn has_expired(&self) -> bool {
        self.started_at.elapsed() >= self.budget
    }
}
