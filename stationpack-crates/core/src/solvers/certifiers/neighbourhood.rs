//! Certifiers which only re-solve the part of an instance around the stations that lack a
//! previous channel.
//!
//! When an instance extends a previously packed one by a few stations, the interesting part is
//! those stations and their neighbours in the constraint graph. Two certifiers build on that
//! neighbourhood:
//! - [`NeighbourhoodUnsatCertifier`] solves the neighbourhood on its own; if it cannot be packed,
//!   neither can the instance.
//! - [`NeighbourhoodSatCertifier`] keeps every station outside the neighbourhood on its previous
//!   channel and solves the neighbourhood around it; a witness of that is a witness of the
//!   instance.
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;

use super::Certification;
use super::Certifier;
use crate::basic_types::SatResult;
use crate::basic_types::Station;
use crate::basic_types::StationPackingInstance;
use crate::data::ConstraintManager;
use crate::grouping::constraint_graph;
use crate::solvers::InstanceSolver;
use crate::solvers::SolveError;
use crate::termination::Composite;
use crate::termination::TerminationCriterion;
use crate::termination::TimeBudget;

#[derive(Clone, Copy, Debug)]
pub struct NeighbourhoodOptions {
    /// Decline when more stations than this lack a previous channel.
    pub max_missing_stations: usize,
    /// Decline when the neighbourhood has more stations than this.
    pub max_to_pack: usize,
    /// The most time, in seconds, each certifier may spend. The shared budget still applies.
    pub time_budget: f64,
}

impl Default for NeighbourhoodOptions {
    fn default() -> Self {
        NeighbourhoodOptions {
            max_missing_stations: 20,
            max_to_pack: 100,
            time_budget: 5.0,
        }
    }
}

/// The stations without a previous channel together with their neighbours, or `None` when the
/// options rule the instance out.
fn neighbourhood(
    instance: &StationPackingInstance,
    constraints: &dyn ConstraintManager,
    options: &NeighbourhoodOptions,
) -> Option<BTreeSet<Station>> {
    let previous = instance.previous_assignment();
    if previous.is_empty() {
        return None;
    }

    let missing = instance
        .stations()
        .filter(|station| !previous.contains_key(station))
        .collect::<BTreeSet<_>>();

    if missing.is_empty() || missing.len() > options.max_missing_stations {
        return None;
    }

    let graph = constraint_graph(instance, constraints);
    let mut stations = missing.clone();
    for &station in missing.iter() {
        stations.extend(graph.neighbors(station));
    }

    if stations.len() > options.max_to_pack {
        debug!(
            "Neighbourhood of {} has {} stations, more than {}",
            instance.name(),
            stations.len(),
            options.max_to_pack
        );
        return None;
    }

    Some(stations)
}

/// Proves an instance UNSAT by showing that the neighbourhood of its new stations cannot be
/// packed.
#[derive(Debug)]
pub struct NeighbourhoodUnsatCertifier {
    constraints: Arc<dyn ConstraintManager>,
    options: NeighbourhoodOptions,
}

impl NeighbourhoodUnsatCertifier {
    pub fn new(
        constraints: Arc<dyn ConstraintManager>,
        options: NeighbourhoodOptions,
    ) -> NeighbourhoodUnsatCertifier {
        NeighbourhoodUnsatCertifier {
            constraints,
            options,
        }
    }
}

impl Certifier for NeighbourhoodUnsatCertifier {
    fn name(&self) -> &str {
        "neighbourhood UNSAT"
    }

    fn certify(
        &self,
        instance: &StationPackingInstance,
        termination: &dyn TerminationCriterion,
        seed: u64,
        solver: &dyn InstanceSolver,
    ) -> Result<Certification, SolveError> {
        let Some(stations) = neighbourhood(instance, self.constraints.as_ref(), &self.options)
        else {
            return Ok(Certification::Declined);
        };

        let budget = Composite::new()
            .with(termination)
            .with(TimeBudget::from_seconds(self.options.time_budget));

        let sub_instance = instance.restricted_to(&stations);
        let result = solver.solve(&sub_instance, &budget, seed)?;

        debug!(
            "Neighbourhood of {} ({} stations) on its own: {}",
            instance.name(),
            stations.len(),
            result.result()
        );

        Ok((result.result() == SatResult::Unsat).then_some(result).into())
    }
}

/// Proves an instance SAT by repacking only the neighbourhood of its new stations, with every
/// other station kept on its previous channel.
#[derive(Debug)]
pub struct NeighbourhoodSatCertifier {
    constraints: Arc<dyn ConstraintManager>,
    options: NeighbourhoodOptions,
}

impl NeighbourhoodSatCertifier {
    pub fn new(
        constraints: Arc<dyn ConstraintManager>,
        options: NeighbourhoodOptions,
    ) -> NeighbourhoodSatCertifier {
        NeighbourhoodSatCertifier {
            constraints,
            options,
        }
    }
}

impl Certifier for NeighbourhoodSatCertifier {
    fn name(&self) -> &str {
        "neighbourhood SAT"
    }

    fn certify(
        &self,
        instance: &StationPackingInstance,
        termination: &dyn TerminationCriterion,
        seed: u64,
        solver: &dyn InstanceSolver,
    ) -> Result<Certification, SolveError> {
        let Some(stations) = neighbourhood(instance, self.constraints.as_ref(), &self.options)
        else {
            return Ok(Certification::Declined);
        };

        let fixed = instance
            .previous_assignment()
            .iter()
            .filter(|(station, _)| !stations.contains(station))
            .map(|(&station, &channel)| (station, channel))
            .collect::<BTreeMap<_, _>>();

        let sub_instance = match instance.with_fixed_channels(&fixed) {
            Ok(sub_instance) => sub_instance,
            Err(error) => {
                debug!("Cannot fix the previous channels of {}: {error}", instance.name());
                return Ok(Certification::Declined);
            }
        };

        let budget = Composite::new()
            .with(termination)
            .with(TimeBudget::from_seconds(self.options.time_budget));

        let result = solver.solve(&sub_instance, &budget, seed)?;

        debug!(
            "Neighbourhood of {} ({} stations) around the previous assignment: {}",
            instance.name(),
            stations.len(),
            result.result()
        );

        Ok((result.result() == SatResult::Sat).then_some(result).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::Channel;
    use crate::basic_types::Domains;
    use crate::data::ChannelSpecificConstraintManager;
    use crate::data::ConstraintKey;
    use crate::sat::backend::CdclBackend;
    use crate::solvers::ComponentSolver;
    use crate::termination::Indefinite;

    /// A chain 1 - 2 - 3 - 4 of co-channel constraints on every channel.
    fn setup() -> (Arc<dyn ConstraintManager>, ComponentSolver) {
        let mut constraints = ChannelSpecificConstraintManager::new();
        for channel in 10..20 {
            for (a, b) in [(1, 2), (2, 3), (3, 4)] {
                constraints.add_constraint(
                    Station::new(a),
                    Station::new(b),
                    channel,
                    ConstraintKey::Co,
                );
            }
        }
        let constraints: Arc<dyn ConstraintManager> = Arc::new(constraints);
        let solver = ComponentSolver::new(
            Arc::clone(&constraints),
            Arc::new(CdclBackend::default()),
        );
        (constraints, solver)
    }

    fn instance(
        domains: &[(u32, &[Channel])],
        previous: &[(u32, Channel)],
    ) -> StationPackingInstance {
        let domains: Domains = domains
            .iter()
            .map(|(id, channels)| (Station::new(*id), channels.iter().copied().collect()))
            .collect();
        let previous = previous
            .iter()
            .map(|&(id, channel)| (Station::new(id), channel))
            .collect();
        StationPackingInstance::new(domains, previous, BTreeMap::new()).unwrap()
    }

    #[test]
    fn neighbourhood_is_the_new_stations_and_their_neighbours() {
        let (constraints, _) = setup();
        let instance = instance(
            &[(1, &[10, 11]), (2, &[10, 11]), (3, &[10, 11]), (4, &[10, 11])],
            &[(1, 10), (2, 11), (3, 10)],
        );

        let options = NeighbourhoodOptions::default();
        let stations = neighbourhood(&instance, constraints.as_ref(), &options);
        assert_eq!(
            stations,
            Some([3, 4].into_iter().map(Station::new).collect())
        );

        let strict = NeighbourhoodOptions {
            max_to_pack: 1,
            ..NeighbourhoodOptions::default()
        };
        assert_eq!(neighbourhood(&instance, constraints.as_ref(), &strict), None);
    }

    #[test]
    fn repacks_around_the_previous_assignment() {
        let (constraints, solver) = setup();
        let instance = instance(
            &[(1, &[10, 11]), (2, &[10, 11]), (3, &[10, 11]), (4, &[10, 11])],
            &[(1, 10), (2, 11), (3, 10)],
        );

        let certifier =
            NeighbourhoodSatCertifier::new(constraints, NeighbourhoodOptions::default());
        let result = certifier
            .certify(&instance, &Indefinite, 7, &solver)
            .unwrap()
            .proof()
            .unwrap();

        assert_eq!(result.result(), SatResult::Sat);
        assert!(result.assignment().is_valid_for(&instance));
        assert_eq!(result.assignment().channel_of(Station::new(1)), Some(10));
        assert_eq!(result.assignment().channel_of(Station::new(2)), Some(11));
    }

    #[test]
    fn infeasible_neighbourhood_proves_unsat() {
        let (constraints, solver) = setup();
        // Stations 3 and 4 cannot both be packed into channel 10.
        let instance = instance(
            &[(1, &[10, 11]), (2, &[10, 11]), (3, &[10]), (4, &[10])],
            &[(1, 10), (2, 11), (3, 10)],
        );

        let unsat = NeighbourhoodUnsatCertifier::new(
            Arc::clone(&constraints),
            NeighbourhoodOptions::default(),
        );
        let result = unsat.certify(&instance, &Indefinite, 0, &solver).unwrap();
        assert_eq!(result.proof().map(|r| r.result()), Some(SatResult::Unsat));

        let sat = NeighbourhoodSatCertifier::new(constraints, NeighbourhoodOptions::default());
        assert!(sat
            .certify(&instance, &Indefinite, 0, &solver)
            .unwrap()
            .proof()
            .is_none());
    }

    #[test]
    fn feasible_neighbourhood_does_not_prove_unsat() {
        let (constraints, solver) = setup();
        let instance = instance(
            &[(1, &[10, 11]), (2, &[10, 11]), (3, &[10, 11]), (4, &[10, 11])],
            &[(1, 10), (2, 11), (3, 10)],
        );

        let unsat = NeighbourhoodUnsatCertifier::new(constraints, NeighbourhoodOptions::default());
        assert!(unsat
            .certify(&instance, &Indefinite, 0, &solver)
            .unwrap()
            .proof()
            .is_none());
    }
}
