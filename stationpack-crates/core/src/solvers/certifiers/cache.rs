use super::Certification;
use super::Certifier;
use crate::basic_types::StationPackingInstance;
use crate::cache::CacheView;
use crate::solvers::InstanceSolver;
use crate::solvers::SolveError;
use crate::termination::TerminationCriterion;

/// Answers instances covered by a proof in the containment cache.
#[derive(Debug)]
pub struct ContainmentCacheCertifier {
    cache: CacheView,
}

impl ContainmentCacheCertifier {
    pub fn new(cache: CacheView) -> ContainmentCacheCertifier {
        ContainmentCacheCertifier { cache }
    }
}

impl Certifier for ContainmentCacheCertifier {
    fn name(&self) -> &str {
        "containment cache"
    }

    fn certify(
        &self,
        instance: &StationPackingInstance,
        _termination: &dyn TerminationCriterion,
        _seed: u64,
        _solver: &dyn InstanceSolver,
    ) -> Result<Certification, SolveError> {
        Ok(self.cache.query(instance).into())
    }
}
