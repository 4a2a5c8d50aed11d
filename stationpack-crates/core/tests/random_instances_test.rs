#![cfg(test)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use stationpack_core::cache::ContainmentCache;
use stationpack_core::data::ChannelSpecificConstraintManager;
use stationpack_core::data::ConstraintKey;
use stationpack_core::data::ConstraintManager;
use stationpack_core::data::DomainStationManager;
use stationpack_core::grouping::ComponentOrder;
use stationpack_core::rand::rngs::SmallRng;
use stationpack_core::rand::Rng;
use stationpack_core::rand::SeedableRng;
use stationpack_core::sat::backend::CdclBackend;
use stationpack_core::solvers::certifiers::NeighbourhoodOptions;
use stationpack_core::solvers::InstanceSolver;
use stationpack_core::solvers::PipelineOptions;
use stationpack_core::solvers::SolverPipeline;
use stationpack_core::termination::Indefinite;
use stationpack_core::Channel;
use stationpack_core::Domains;
use stationpack_core::SatResult;
use stationpack_core::Station;
use stationpack_core::StationPackingInstance;

const NUM_STATIONS: u32 = 7;
const CHANNELS: [Channel; 3] = [1, 2, 3];

fn random_constraints(rng: &mut SmallRng) -> ChannelSpecificConstraintManager {
    let mut constraints = ChannelSpecificConstraintManager::new();

    for a in 1..=NUM_STATIONS {
        for b in (a + 1)..=NUM_STATIONS {
            if rng.gen_bool(0.3) {
                for channel in CHANNELS {
                    constraints.add_constraint(
                        Station::new(a),
                        Station::new(b),
                        channel,
                        ConstraintKey::Co,
                    );
                }
            } else if rng.gen_bool(0.2) {
                let channel = CHANNELS[rng.gen_range(0..CHANNELS.len())];
                constraints.add_constraint(
                    Station::new(a),
                    Station::new(b),
                    channel,
                    ConstraintKey::AdjPlusOne,
                );
            }
        }
    }

    constraints
}

fn random_instance(rng: &mut SmallRng) -> StationPackingInstance {
    let mut domains = Domains::new();
    let mut previous = BTreeMap::new();

    for id in 1..=NUM_STATIONS {
        if rng.gen_bool(0.15) {
            continue;
        }

        let mut domain = CHANNELS
            .iter()
            .copied()
            .filter(|_| rng.gen_bool(0.7))
            .collect::<BTreeSet<_>>();
        if domain.is_empty() {
            let _ = domain.insert(CHANNELS[rng.gen_range(0..CHANNELS.len())]);
        }

        if rng.gen_bool(0.6) {
            let channels = domain.iter().copied().collect::<Vec<_>>();
            let _ = previous.insert(Station::new(id), channels[rng.gen_range(0..channels.len())]);
        }

        let _ = domains.insert(Station::new(id), domain);
    }

    StationPackingInstance::new(domains, previous, BTreeMap::new()).unwrap()
}

/// Whether some assignment of the instance violates no constraint, by enumeration.
fn is_feasible(instance: &StationPackingInstance, constraints: &dyn ConstraintManager) -> bool {
    fn extend(
        stations: &[(Station, Vec<Channel>)],
        assignment: &mut BTreeMap<Station, Channel>,
        constraints: &dyn ConstraintManager,
    ) -> bool {
        let Some(((station, domain), rest)) = stations.split_first() else {
            return true;
        };

        for &channel in domain {
            let _ = assignment.insert(*station, channel);
            if constraints.is_satisfying_assignment(assignment)
                && extend(rest, assignment, constraints)
            {
                return true;
            }
        }

        let _ = assignment.remove(station);
        false
    }

    let stations = instance
        .domains()
        .iter()
        .map(|(&station, domain)| (station, domain.iter().copied().collect()))
        .collect::<Vec<_>>();

    extend(&stations, &mut BTreeMap::new(), constraints)
}

#[test]
fn pipeline_agrees_with_enumeration() {
    let mut rng = SmallRng::seed_from_u64(7);

    for round in 0..40 {
        let constraints = Arc::new(random_constraints(&mut rng));
        let stations = Arc::new(
            DomainStationManager::new(
                (1..=NUM_STATIONS)
                    .map(|id| (Station::new(id), BTreeSet::from([1, 2, 3, 4])))
                    .collect(),
            )
            .unwrap(),
        );

        let order = match round % 3 {
            0 => ComponentOrder::LargestFirst,
            1 => ComponentOrder::SmallestFirst,
            _ => ComponentOrder::AsGiven,
        };
        let shared: Arc<dyn ConstraintManager> = Arc::clone(&constraints) as _;
        let pipeline = SolverPipeline::builder(stations, shared, Arc::new(CdclBackend::default()))
        .with_options(PipelineOptions {
            component_order: order,
            remove_underconstrained: round % 2 == 0,
            ..Default::default()
        })
        .with_cache(Arc::new(ContainmentCache::new()))
        .with_default_certifiers(NeighbourhoodOptions::default())
        .build();

        for _ in 0..5 {
            let instance = random_instance(&mut rng);
            let result = pipeline.solve(&instance, &Indefinite, rng.gen()).unwrap();
            let feasible = is_feasible(&instance, constraints.as_ref());

            if feasible {
                assert_eq!(result.result(), SatResult::Sat, "round {round}: {instance:?}");
                assert!(result.assignment().is_valid_for(&instance));
                assert!(
                    constraints.is_satisfying_assignment(&result.assignment().station_channels())
                );
            } else {
                assert_eq!(result.result(), SatResult::Unsat, "round {round}: {instance:?}");
            }
        }
    }
}
