use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;

use super::Certification;
use super::Certifier;
use crate::basic_types::Channel;
use crate::basic_types::Domains;
use crate::basic_types::HashMap;
use crate::basic_types::HashSet;
use crate::basic_types::SolverResult;
use crate::basic_types::Station;
use crate::basic_types::StationPackingInstance;
use crate::basic_types::Stopwatch;
use crate::data::ConstraintManager;
use crate::solvers::InstanceSolver;
use crate::solvers::SolveError;
use crate::termination::TerminationCriterion;

/// Removes channels which no witness can use, by enforcing arc consistency (AC-3) on the
/// constraint graph.
///
/// A channel of a station survives only if every neighbour has a channel compatible with it. When
/// some domain runs empty the instance is UNSAT; otherwise the narrowed instance is passed on.
#[derive(Debug)]
pub struct ArcConsistencyCertifier {
    constraints: Arc<dyn ConstraintManager>,
}

impl ArcConsistencyCertifier {
    pub fn new(constraints: Arc<dyn ConstraintManager>) -> ArcConsistencyCertifier {
        ArcConsistencyCertifier { constraints }
    }
}

/// The relevant constraints of an instance, indexed for support checks.
struct Interference {
    forbidden: HashSet<(Station, Channel, Station, Channel)>,
    neighbours: HashMap<Station, BTreeSet<Station>>,
}

impl Interference {
    fn new(instance: &StationPackingInstance, constraints: &dyn ConstraintManager) -> Self {
        let mut forbidden = HashSet::default();
        let mut neighbours: HashMap<Station, BTreeSet<Station>> = HashMap::default();

        for constraint in constraints.relevant_constraints(instance.domains()) {
            let (a, b) = (constraint.source, constraint.target);
            if a == b {
                continue;
            }
            let (ca, cb) = (constraint.source_channel, constraint.target_channel);

            let _ = forbidden.insert((a, ca, b, cb));
            let _ = forbidden.insert((b, cb, a, ca));
            let _ = neighbours.entry(a).or_default().insert(b);
            let _ = neighbours.entry(b).or_default().insert(a);
        }

        Interference {
            forbidden,
            neighbours,
        }
    }

    fn neighbours(&self, station: Station) -> impl Iterator<Item = Station> + '_ {
        self.neighbours.get(&station).into_iter().flatten().copied()
    }

    /// Removes the channels of `x` which have no compatible channel of `y`. Returns whether
    /// anything was removed.
    fn revise(&self, domains: &mut Domains, x: Station, y: Station) -> bool {
        let Some(targets) = domains.get(&y).cloned() else {
            return false;
        };
        let Some(domain) = domains.get_mut(&x) else {
            return false;
        };

        let before = domain.len();
        domain.retain(|&vx| {
            targets
                .iter()
                .any(|&vy| !self.forbidden.contains(&(x, vx, y, vy)))
        });

        domain.len() != before
    }
}

impl Certifier for ArcConsistencyCertifier {
    fn name(&self) -> &str {
        "arc consistency"
    }

    fn certify(
        &self,
        instance: &StationPackingInstance,
        termination: &dyn TerminationCriterion,
        _seed: u64,
        _solver: &dyn InstanceSolver,
    ) -> Result<Certification, SolveError> {
        let stopwatch = Stopwatch::starting_now();
        let interference = Interference::new(instance, self.constraints.as_ref());

        let mut domains = instance.domains().clone();
        let mut queue = VecDeque::new();
        let mut queued: HashSet<(Station, Station)> = HashSet::default();
        for x in instance.stations() {
            for y in interference.neighbours(x) {
                queue.push_back((x, y));
                let _ = queued.insert((x, y));
            }
        }

        while let Some((x, y)) = queue.pop_front() {
            let _ = queued.remove(&(x, y));

            if !interference.revise(&mut domains, x, y) {
                continue;
            }

            if domains[&x].is_empty() {
                debug!(
                    "Arc consistency emptied the domain of station {x} in {}",
                    instance.name()
                );
                return Ok(Certification::Proved(SolverResult::unsat(
                    stopwatch.elapsed_seconds(),
                )));
            }

            // Removals already made are sound, so stopping early keeps them.
            if termination.has_expired() {
                break;
            }

            for z in interference.neighbours(x).filter(|&z| z != y) {
                if queued.insert((z, x)) {
                    queue.push_back((z, x));
                }
            }
        }

        let removed = instance
            .domains()
            .values()
            .map(BTreeSet::len)
            .sum::<usize>()
            - domains.values().map(BTreeSet::len).sum::<usize>();

        if removed == 0 {
            return Ok(Certification::Declined);
        }

        debug!(
            "Arc consistency removed {removed} channels from {}",
            instance.name()
        );

        match instance.with_domains(domains) {
            Ok(narrowed) => Ok(Certification::Narrowed(narrowed)),
            Err(error) => {
                debug!("Cannot narrow {}: {error}", instance.name());
                Ok(Certification::Declined)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::basic_types::SatResult;
    use crate::data::ChannelSpecificConstraintManager;
    use crate::data::ConstraintKey;
    use crate::sat::backend::CdclBackend;
    use crate::solvers::ComponentSolver;
    use crate::termination::Indefinite;

    fn setup(co: &[(u32, u32, Channel)]) -> (ArcConsistencyCertifier, ComponentSolver) {
        let mut constraints = ChannelSpecificConstraintManager::new();
        for &(a, b, channel) in co {
            constraints.add_constraint(Station::new(a), Station::new(b), channel, ConstraintKey::Co);
        }
        let constraints: Arc<dyn ConstraintManager> = Arc::new(constraints);
        let solver = ComponentSolver::new(
            Arc::clone(&constraints),
            Arc::new(CdclBackend::default()),
        );
        (ArcConsistencyCertifier::new(constraints), solver)
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
    fn unsupported_channels_are_removed_along_the_chain() {
        // 1 is stuck on 14, which pushes 2 onto 15, which pushes 3 onto 16.
        let (certifier, solver) = setup(&[(1, 2, 14), (2, 3, 15)]);
        let instance = instance(
            &[(1, &[14]), (2, &[14, 15]), (3, &[15, 16])],
            &[(2, 14), (3, 16)],
        );

        let Certification::Narrowed(narrowed) = certifier
            .certify(&instance, &Indefinite, 0, &solver)
            .unwrap()
        else {
            panic!("expected the domains to be narrowed");
        };

        assert_eq!(narrowed.domain(Station::new(2)), Some(&BTreeSet::from([15])));
        assert_eq!(narrowed.domain(Station::new(3)), Some(&BTreeSet::from([16])));
        assert_eq!(
            narrowed.previous_assignment(),
            &BTreeMap::from([(Station::new(3), 16)])
        );
    }

    #[test]
    fn an_emptied_domain_proves_unsat() {
        let (certifier, solver) = setup(&[(1, 2, 14)]);
        let instance = instance(&[(1, &[14]), (2, &[14])], &[]);

        let result = certifier
            .certify(&instance, &Indefinite, 0, &solver)
            .unwrap()
            .proof()
            .unwrap();

        assert_eq!(result.result(), SatResult::Unsat);
    }

    #[test]
    fn arc_consistent_instances_are_declined() {
        let (certifier, solver) = setup(&[(1, 2, 14), (1, 2, 15)]);
        let instance = instance(&[(1, &[14, 15]), (2, &[14, 15])], &[]);

        assert!(matches!(
            certifier.certify(&instance, &Indefinite, 0, &solver).unwrap(),
            Certification::Declined
        ));
    }
}
