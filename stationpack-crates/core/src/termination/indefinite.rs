use super::TerminationCriterion;
use super::UNBOUNDED;

/// A [`TerminationCriterion`] which never expires. The solver can search forever.
#[derive(Clone, Copy, Debug, Default)]
pub struct Indefinite;

impl TerminationCriterion for Indefinite {
    fn remaining_time(&self) -> f64 {
        UNBOUNDED
    }

    fn has_expired(&self) -> bool {
        false
    }
}
