use std::sync::Arc;

use log::trace;

use super::Certification;
use super::Certifier;
use crate::basic_types::Assignment;
use crate::basic_types::SolverResult;
use crate::basic_types::StationPackingInstance;
use crate::basic_types::Stopwatch;
use crate::data::ConstraintManager;
use crate::solvers::InstanceSolver;
use crate::solvers::SolveError;
use crate::termination::TerminationCriterion;

/// Proves an instance SAT when its previous assignment covers every station and violates no
/// constraint.
#[derive(Debug)]
pub struct PreviousAssignmentCertifier {
    constraints: Arc<dyn ConstraintManager>,
}

impl PreviousAssignmentCertifier {
    pub fn new(constraints: Arc<dyn ConstraintManager>) -> PreviousAssignmentCertifier {
        PreviousAssignmentCertifier { constraints }
    }
}

impl Certifier for PreviousAssignmentCertifier {
    fn name(&self) -> &str {
        "previous assignment"
    }

    fn certify(
        &self,
        instance: &StationPackingInstance,
        _termination: &dyn TerminationCriterion,
        _seed: u64,
        _solver: &dyn InstanceSolver,
    ) -> Result<Certification, SolveError> {
        let stopwatch = Stopwatch::starting_now();
        let previous = instance.previous_assignment();

        let covers_instance = instance.domains().iter().all(|(station, domain)| {
            previous
                .get(station)
                .is_some_and(|channel| domain.contains(channel))
        });

        if !covers_instance {
            trace!("The previous assignment does not cover {}", instance.name());
            return Ok(Certification::Declined);
        }

        if !self.constraints.is_satisfying_assignment(previous) {
            trace!("The previous assignment of {} violates constraints", instance.name());
            return Ok(Certification::Declined);
        }

        let witness = previous
            .iter()
            .map(|(&station, &channel)| (station, channel))
            .collect::<Assignment>();

        Ok(Certification::Proved(SolverResult::sat(
            witness,
            stopwatch.elapsed_seconds(),
        )))
    }
}
