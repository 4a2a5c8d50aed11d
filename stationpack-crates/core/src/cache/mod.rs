//! Memoisation of proofs across solve calls.
//!
//! Packability is monotone: a witness for a set of stations restricts to a witness for each of
//! its subsets, and an infeasible set stays infeasible when stations are added or domains shrink.
//! The [`ContainmentCache`] stores SAT and UNSAT proofs and answers queries for instances which
//! one of these arguments covers, without solving anything.
use std::sync::Arc;

use crate::basic_types::SolverResult;
use crate::basic_types::StationPackingInstance;
use crate::data::ConstraintManager;
use crate::data::StationManager;

mod containment;

pub use containment::ContainmentCache;

/// Identifies the station and constraint data a proof was made under. Proofs are only reused
/// under an identical context.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheContext {
    stations: String,
    constraints: String,
}

impl CacheContext {
    pub fn new(stations: &dyn StationManager, constraints: &dyn ConstraintManager) -> CacheContext {
        CacheContext::from_fingerprints(stations.fingerprint(), constraints.fingerprint())
    }

    pub fn from_fingerprints(
        stations: impl Into<String>,
        constraints: impl Into<String>,
    ) -> CacheContext {
        CacheContext {
            stations: stations.into(),
            constraints: constraints.into(),
        }
    }
}

/// A [`ContainmentCache`] together with the context all its queries and inserts use.
#[derive(Clone, Debug)]
pub struct CacheView {
    cache: Arc<ContainmentCache>,
    context: CacheContext,
}

impl CacheView {
    pub fn new(cache: Arc<ContainmentCache>, context: CacheContext) -> CacheView {
        CacheView { cache, context }
    }

    pub fn cache(&self) -> &Arc<ContainmentCache> {
        &self.cache
    }

    pub fn context(&self) -> &CacheContext {
        &self.context
    }

    pub fn query(&self, instance: &StationPackingInstance) -> Option<SolverResult> {
        self.cache.query(&self.context, instance)
    }

    pub fn insert(&self, instance: &StationPackingInstance, result: &SolverResult) -> bool {
        self.cache.insert(&self.context, instance, result)
    }
}
