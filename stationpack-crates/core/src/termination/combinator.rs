use super::TerminationCriterion;
use super::UNBOUNDED;

/// A [`TerminationCriterion`] which expires when one of two given criteria expires.
#[derive(Clone, Copy, Debug)]
pub struct Combinator<T1, T2> {
    t1: T1,
    t2: T2,
}

impl<T1, T2> Combinator<T1, T2> {
    /// Combine two [`TerminationCriterion`]s into one.
    pub fn new(t1: T1, t2: T2) -> Self {
        Combinator { t1, t2 }
    }
}

impl<T1: TerminationCriterion, T2: TerminationCriterion> TerminationCriterion
    for Combinator<T1, T2>
{
    fn remaining_time(&self) -> f64 {
        self.t1.remaining_time().min(self.t2.remaining_time())
    }

    fn has_expired(&self) -> bool {
        self.t1.has_expired() || self.t2.has_expired()
    }

    fn record_elapsed(&self, seconds: f64) {
        self.t1.record_elapsed(seconds);
        self.t2.record_elapsed(seconds);
    }
}

/// The conjunction of any number of criteria: the remaining time is the minimum over the
/// children and the composite expires as soon as any child does. Elapsed time is reported to
/// every child. Without children it behaves like [`Indefinite`](super::Indefinite).
#[derive(Debug, Default)]
pub struct Composite<'a> {
    criteria: Vec<Box<dyn TerminationCriterion + 'a>>,
}

impl<'a> Composite<'a> {
    pub fn new() -> Self {
        Composite::default()
    }

    pub fn with(mut self, criterion: impl TerminationCriterion + 'a) -> Self {
        self.criteria.push(Box::new(criterion));
        self
    }

    pub fn push(&mut self, criterion: impl TerminationCriterion + 'a) {
        self.criteria.push(Box::new(criterion));
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

impl TerminationCriterion for Composite<'_> {
    fn remaining_time(&self) -> f64 {
        self.criteria
            .iter()
            .map(|criterion| criterion.remaining_time())
            .fold(UNBOUNDED, f64::min)
    }

    fn has_expired(&self) -> bool {
        self.criteria.iter().any(|criterion| criterion.has_expired())
    }

    fn record_elapsed(&self, seconds: f64) {
        for criterion in self.criteria.iter() {
            criterion.record_elapsed(seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Combinator;
    use super::Composite;
    use crate::termination::CancellationFlag;
    use crate::termination::ElapsedTimeBudget;
    use crate::termination::Indefinite;
    use crate::termination::TerminationCriterion;
    use crate::termination::UNBOUNDED;

    #[test]
    fn composite_reports_the_minimum_remaining_time() {
        let long = ElapsedTimeBudget::new(10.0);
        let short = ElapsedTimeBudget::new(3.0);
        let composite = Composite::new().with(&long).with(&short).with(Indefinite);

        assert_eq!(composite.remaining_time(), 3.0);
        assert!(!composite.has_expired());
    }

    #[test]
    fn composite_forwards_elapsed_time_to_every_child() {
        let first = ElapsedTimeBudget::new(10.0);
        let second = ElapsedTimeBudget::new(3.0);
        let composite = Composite::new().with(&first).with(&second);

        composite.record_elapsed(3.0);
        assert_eq!(first.remaining_time(), 7.0);
        assert!(second.has_expired());
        assert!(composite.has_expired());
    }

    #[test]
    fn composite_expires_when_any_child_expires() {
        let flag = CancellationFlag::new();
        let composite = Composite::new().with(Indefinite).with(flag.clone());
        assert!(!composite.has_expired());

        flag.cancel();
        assert!(composite.has_expired());
    }

    #[test]
    fn empty_composite_is_unbounded() {
        let composite = Composite::new();
        assert!(composite.is_empty());
        assert_eq!(composite.remaining_time(), UNBOUNDED);
        assert!(!composite.has_expired());
    }

    #[test]
    fn combinator_combines_two_criteria() {
        let budget = ElapsedTimeBudget::new(1.0);
        let combined = Combinator::new(&budget, Indefinite);
        combined.record_elapsed(0.25);
        assert_eq!(combined.remaining_time(), 0.75);
        assert!(!combined.has_expired());
    }
}
