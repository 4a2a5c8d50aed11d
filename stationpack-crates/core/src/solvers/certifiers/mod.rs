//! Layers which may settle an instance before it is solved.
//!
//! A [`Certifier`] either proves the instance SAT or UNSAT, narrows its domains, or declines. The
//! pipeline asks its certifiers in a fixed order and stops at the first proof; a narrowed instance
//! replaces the original for the certifiers and the solving after it.
use std::fmt::Debug;

use super::InstanceSolver;
use super::SolveError;
use crate::basic_types::SolverResult;
use crate::basic_types::StationPackingInstance;
use crate::termination::TerminationCriterion;

mod arc_consistency;
mod cache;
mod neighbourhood;
mod previous_assignment;

pub use arc_consistency::ArcConsistencyCertifier;
pub use cache::ContainmentCacheCertifier;
pub use neighbourhood::NeighbourhoodOptions;
pub use neighbourhood::NeighbourhoodSatCertifier;
pub use neighbourhood::NeighbourhoodUnsatCertifier;
pub use previous_assignment::PreviousAssignmentCertifier;

/// What a [`Certifier`] made of an instance.
#[derive(Debug)]
pub enum Certification {
    /// A SAT or UNSAT answer.
    Proved(SolverResult),
    /// An instance with the same witnesses and smaller domains.
    Narrowed(StationPackingInstance),
    Declined,
}

impl Certification {
    pub fn proof(self) -> Option<SolverResult> {
        match self {
            Certification::Proved(result) => Some(result),
            Certification::Narrowed(_) | Certification::Declined => None,
        }
    }
}

impl From<Option<SolverResult>> for Certification {
    fn from(proof: Option<SolverResult>) -> Self {
        proof.map_or(Certification::Declined, Certification::Proved)
    }
}

pub trait Certifier: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Settles `instance`, narrows it, or declines.
    ///
    /// `solver` decides the sub-instances the certifier derives from `instance`.
    fn certify(
        &self,
        instance: &StationPackingInstance,
        termination: &dyn TerminationCriterion,
        seed: u64,
        solver: &dyn InstanceSolver,
    ) -> Result<Certification, SolveError>;
}
