use std::sync::Arc;

use log::debug;
use log::warn;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use super::InstanceSolver;
use super::SolveError;
use crate::basic_types::Assignment;
use crate::basic_types::SatResult;
use crate::basic_types::SolverResult;
use crate::basic_types::StationPackingInstance;
use crate::basic_types::Stopwatch;
use crate::cache::CacheView;
use crate::data::ConstraintManager;
use crate::grouping::ComponentOrder;
use crate::grouping::ConstraintGrouper;
use crate::sat::backend::BackendError;
use crate::sat::backend::SatSolver;
use crate::sat::SatEncoder;
use crate::sat::VariableCompressor;
use crate::stationpack_assert_moderate;
use crate::stationpack_assert_simple;
use crate::termination::TerminationCriterion;

/// Solves an instance component by component with a [`SatSolver`].
///
/// Components are handled one after the other under the shared termination criterion, each with
/// its own seed drawn from the seed of the call. The answers are joined as follows:
/// - an UNSAT component makes the instance UNSAT, the remaining components are skipped;
/// - a CRASHED or KILLED component ends the call with that result;
/// - otherwise any TIMEOUT component makes the instance TIMEOUT;
/// - only when every component is SAT is the instance SAT, with the union of the witnesses.
///
/// The runtime of the result is the sum of the time spent on the components.
#[derive(Debug)]
pub struct ComponentSolver {
    constraints: Arc<dyn ConstraintManager>,
    backend: Arc<dyn SatSolver>,
    grouper: ConstraintGrouper,
    cache: Option<CacheView>,
}

impl ComponentSolver {
    pub fn new(constraints: Arc<dyn ConstraintManager>, backend: Arc<dyn SatSolver>) -> Self {
        ComponentSolver {
            constraints,
            backend,
            grouper: ConstraintGrouper::default(),
            cache: None,
        }
    }

    pub fn with_order(mut self, order: ComponentOrder) -> Self {
        self.grouper = ConstraintGrouper::new(order);
        self
    }

    /// Query `cache` before solving a component and store every conclusive component answer.
    pub fn with_cache(mut self, cache: CacheView) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn backend(&self) -> &Arc<dyn SatSolver> {
        &self.backend
    }

    /// Decides a single component: encode, compress, run the backend, map the model back.
    pub fn solve_component(
        &self,
        component: &StationPackingInstance,
        termination: &dyn TerminationCriterion,
        seed: u64,
    ) -> Result<SolverResult, SolveError> {
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.query(component)) {
            return Ok(hit);
        }

        let stopwatch = Stopwatch::starting_now();

        let encoding = SatEncoder.encode(component, self.constraints.as_ref());
        let (cnf, compression) = VariableCompressor.compress(encoding.cnf());

        let answer = self.backend.solve(&cnf, termination, seed);
        termination.record_elapsed(answer.runtime());

        let result = match answer.result() {
            SatResult::Sat => {
                let witness = compression
                    .decompress(answer.model())
                    .and_then(|model| encoding.decode(component, &model))
                    .inspect_err(|error| {
                        warn!(
                            "{} reported an unusable model for {}: {error}",
                            self.backend.name(),
                            component.name()
                        )
                    })?;

                stationpack_assert_moderate!(self
                    .constraints
                    .is_satisfying_assignment(&witness.station_channels()));

                SolverResult::sat(witness, stopwatch.elapsed_seconds())
            }
            other => SolverResult::without_assignment(other, stopwatch.elapsed_seconds()),
        };

        debug!(
            "{} ({} stations, {} clauses): {} in {:.3}s",
            component.name(),
            component.num_stations(),
            cnf.num_clauses(),
            result.result(),
            result.runtime()
        );

        if let Some(cache) = self.cache.as_ref() {
            let _ = cache.insert(component, &result);
        }

        Ok(result)
    }
}

impl InstanceSolver for ComponentSolver {
    fn solve(
        &self,
        instance: &StationPackingInstance,
        termination: &dyn TerminationCriterion,
        seed: u64,
    ) -> Result<SolverResult, SolveError> {
        let components = self.grouper.group(instance, self.constraints.as_ref());
        let mut rng = SmallRng::seed_from_u64(seed);

        let mut witness = Assignment::new();
        let mut runtime = 0.0;
        let mut timed_out = false;

        for (index, stations) in components.iter().enumerate() {
            if termination.has_expired() {
                debug!(
                    "Budget exhausted, {} of {} components of {} left unsolved",
                    components.len() - index,
                    components.len(),
                    instance.name()
                );
                timed_out = true;
                break;
            }

            let component = instance.component(index, stations);
            let result = self.solve_component(&component, termination, rng.gen())?;
            runtime += result.runtime();

            match result.result() {
                SatResult::Sat => witness.merge(result.assignment()),
                SatResult::Unsat => return Ok(SolverResult::unsat(runtime)),
                SatResult::Crashed | SatResult::Killed => {
                    return Ok(SolverResult::without_assignment(result.result(), runtime))
                }
                SatResult::Timeout => timed_out = true,
            }
        }

        if timed_out {
            return Ok(SolverResult::timeout(runtime));
        }

        stationpack_assert_simple!(
            witness.is_valid_for(instance),
            "the joined witness must place every station exactly once"
        );

        Ok(SolverResult::sat(witness, runtime))
    }

    fn interrupt(&self) -> Result<(), BackendError> {
        self.backend.interrupt()
    }

    fn notify_shutdown(&self) {
        self.backend.notify_shutdown()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use super::*;
    use crate::basic_types::Channel;
    use crate::basic_types::Domains;
    use crate::basic_types::Station;
    use crate::cache::CacheContext;
    use crate::cache::ContainmentCache;
    use crate::data::ChannelSpecificConstraintManager;
    use crate::data::ConstraintKey;
    use crate::sat::backend::CdclBackend;
    use crate::sat::backend::SatSolverResult;
    use crate::sat::Cnf;
    use crate::sat::Literal;
    use crate::termination::Indefinite;
    use crate::termination::TimeBudget;

    fn instance(entries: &[(u32, &[Channel])]) -> StationPackingInstance {
        let domains: Domains = entries
            .iter()
            .map(|(id, channels)| (Station::new(*id), channels.iter().copied().collect()))
            .collect();
        StationPackingInstance::from_domains(domains).unwrap()
    }

    /// Stations 1-2 and 3-4 interfere co-channel.
    fn constraints() -> Arc<ChannelSpecificConstraintManager> {
        let mut constraints = ChannelSpecificConstraintManager::new();
        for channel in 10..20 {
            constraints.add_constraint(
                Station::new(1),
                Station::new(2),
                channel,
                ConstraintKey::Co,
            );
            constraints.add_constraint(
                Station::new(3),
                Station::new(4),
                channel,
                ConstraintKey::Co,
            );
        }
        Arc::new(constraints)
    }

    /// Replays scripted answers, one per call, and records the number of calls.
    #[derive(Debug)]
    struct Scripted {
        answers: Mutex<Vec<SatResult>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut answers: Vec<SatResult>) -> Scripted {
            answers.reverse();
            Scripted {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SatSolver for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn solve(
            &self,
            cnf: &Cnf,
            termination: &dyn TerminationCriterion,
            seed: u64,
        ) -> SatSolverResult {
            let _ = self.calls.fetch_add(1, Ordering::Relaxed);
            match self.answers.lock().unwrap().pop() {
                Some(SatResult::Sat) | None => CdclBackend::default().solve(cnf, termination, seed),
                Some(other) => SatSolverResult::without_model(other, 1.0),
            }
        }
    }

    /// Claims every formula is satisfied by setting every variable to true.
    #[derive(Debug)]
    struct AllTrue;

    impl SatSolver for AllTrue {
        fn name(&self) -> &str {
            "all-true"
        }

        fn solve(&self, cnf: &Cnf, _: &dyn TerminationCriterion, _: u64) -> SatSolverResult {
            let model = cnf.variables().into_iter().map(Literal::positive).collect();
            SatSolverResult::new(SatResult::Sat, 0.0, model)
        }
    }

    #[test]
    fn witnesses_of_components_are_joined() {
        let solver = ComponentSolver::new(constraints(), Arc::new(CdclBackend::default()));
        let instance = instance(&[(1, &[10, 11]), (2, &[10, 11]), (3, &[12, 13]), (4, &[12])]);

        let result = solver.solve(&instance, &Indefinite, 42).unwrap();
        assert_eq!(result.result(), SatResult::Sat);
        assert!(result.assignment().is_valid_for(&instance));
        assert!(constraints().is_satisfying_assignment(&result.assignment().station_channels()));
    }

    #[test]
    fn an_unsat_component_short_circuits() {
        // {1, 2} is unsatisfiable, {3, 4} would time out but is never attempted.
        let backend = Arc::new(Scripted::new(vec![SatResult::Unsat, SatResult::Timeout]));
        let shared: Arc<dyn SatSolver> = Arc::clone(&backend) as _;
        let solver = ComponentSolver::new(constraints(), shared)
            .with_order(ComponentOrder::AsGiven);
        let instance = instance(&[(1, &[10]), (2, &[10]), (3, &[12, 13]), (4, &[12])]);

        let result = solver.solve(&instance, &Indefinite, 0).unwrap();
        assert_eq!(result.result(), SatResult::Unsat);
        assert_eq!(backend.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unsat_wins_over_an_earlier_timeout() {
        let backend = Arc::new(Scripted::new(vec![SatResult::Timeout, SatResult::Unsat]));
        let shared: Arc<dyn SatSolver> = Arc::clone(&backend) as _;
        let solver = ComponentSolver::new(constraints(), shared);
        let instance = instance(&[(1, &[10]), (2, &[10]), (3, &[12]), (4, &[12])]);

        let result = solver.solve(&instance, &Indefinite, 0).unwrap();
        assert_eq!(result.result(), SatResult::Unsat);
        assert_eq!(backend.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn crashes_and_kills_propagate() {
        for outcome in [SatResult::Crashed, SatResult::Killed] {
            let backend = Arc::new(Scripted::new(vec![SatResult::Sat, outcome]));
            let solver = ComponentSolver::new(constraints(), backend);
            let instance = instance(&[(1, &[10, 11]), (2, &[10, 11]), (3, &[12]), (4, &[13])]);

            assert_eq!(solver.solve(&instance, &Indefinite, 0).unwrap().result(), outcome);
        }
    }

    #[test]
    fn timeouts_make_the_instance_time_out() {
        let backend = Arc::new(Scripted::new(vec![SatResult::Timeout]));
        let solver = ComponentSolver::new(constraints(), backend);
        let instance = instance(&[(1, &[10, 11]), (2, &[10, 11]), (3, &[12]), (4, &[13])]);

        let result = solver.solve(&instance, &Indefinite, 0).unwrap();
        assert_eq!(result.result(), SatResult::Timeout);
        assert!(result.assignment().is_empty());
    }

    #[test]
    fn expired_budget_skips_every_component() {
        let backend = Arc::new(Scripted::new(vec![]));
        let shared: Arc<dyn SatSolver> = Arc::clone(&backend) as _;
        let solver = ComponentSolver::new(constraints(), shared);
        let instance = instance(&[(1, &[10, 11]), (2, &[10, 11])]);

        let result = solver
            .solve(&instance, &TimeBudget::from_seconds(0.0), 0)
            .unwrap();
        assert_eq!(result.result(), SatResult::Timeout);
        assert_eq!(backend.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn unusable_models_are_decode_errors() {
        let solver = ComponentSolver::new(constraints(), Arc::new(AllTrue));
        let instance = instance(&[(1, &[10, 11])]);

        assert!(matches!(
            solver.solve(&instance, &Indefinite, 0),
            Err(SolveError::Decode(_))
        ));
    }

    #[test]
    fn components_are_served_from_the_cache() {
        let cache = CacheView::new(
            Arc::new(ContainmentCache::new()),
            CacheContext::from_fingerprints("s", "c"),
        );
        let backend = Arc::new(Scripted::new(vec![]));
        let shared: Arc<dyn SatSolver> = Arc::clone(&backend) as _;
        let solver = ComponentSolver::new(constraints(), shared)
            .with_cache(cache.clone());

        let instance = instance(&[(1, &[10, 11]), (2, &[10, 11])]);
        assert_eq!(
            solver.solve(&instance, &Indefinite, 0).unwrap().result(),
            SatResult::Sat
        );
        assert_eq!(backend.calls.load(Ordering::Relaxed), 1);
        assert_eq!(cache.cache().num_sat(), 1);

        assert_eq!(
            solver.solve(&instance, &Indefinite, 0).unwrap().result(),
            SatResult::Sat
        );
        assert_eq!(backend.calls.load(Ordering::Relaxed), 1);
    }
}
