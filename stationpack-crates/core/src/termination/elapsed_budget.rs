use std::sync::Mutex;

use super::TerminationCriterion;

/// A [`TerminationCriterion`] with a budget of seconds that is only drained by
/// [`TerminationCriterion::record_elapsed`]. Time that nobody reports is not charged.
#[derive(Debug)]
pub struct ElapsedTimeBudget {
    budget: f64,
    spent: Mutex<f64>,
}

impl ElapsedTimeBudget {
    pub fn new(budget_seconds: f64) -> ElapsedTimeBudget {
        ElapsedTimeBudget {
            budget: budget_seconds.max(0.0),
            spent: Mutex::new(0.0),
        }
    }

    fn spent(&self) -> f64 {
        match self.spent.lock() {
            Ok(spent) => *spent,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl TerminationCriterion for ElapsedTimeBudget {
    fn remaining_time(&self) -> f64 {
        (self.budget - self.spent()).max(0.0)
    }

    fn record_elapsed(&self, seconds: f64) {
        let mut spent = match self.spent.lock() {
            Ok(spent) => spent,
            Err(poisoned) => poisoned.into_inner(),
        };
        *spent += seconds.max(0.0);
    }
}
