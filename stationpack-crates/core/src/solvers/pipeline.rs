use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;
use log::info;
use log::warn;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use super::certifiers::ArcConsistencyCertifier;
use super::certifiers::ContainmentCacheCertifier;
use super::certifiers::NeighbourhoodOptions;
use super::certifiers::NeighbourhoodSatCertifier;
use super::certifiers::NeighbourhoodUnsatCertifier;
use super::certifiers::PreviousAssignmentCertifier;
use super::Certification;
use super::Certifier;
use super::ComponentSolver;
use super::InputError;
use super::InstanceSolver;
use super::SolveError;
use super::UnderconstrainedStationFinder;
use crate::basic_types::Assignment;
use crate::basic_types::SatResult;
use crate::basic_types::SolverResult;
use crate::basic_types::Station;
use crate::basic_types::StationPackingInstance;
use crate::basic_types::Stopwatch;
use crate::cache::CacheContext;
use crate::cache::CacheView;
use crate::cache::ContainmentCache;
use crate::data::ConstraintManager;
use crate::data::StationManager;
use crate::grouping::ComponentOrder;
use crate::sat::backend::BackendError;
use crate::sat::backend::SatSolver;
use crate::stationpack_assert_simple;
use crate::termination::TerminationCriterion;

/// Options which influence how a [`SolverPipeline`] spends its time. None of them change the
/// answer.
#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    /// The order in which components are solved.
    pub component_order: ComponentOrder,
    /// Whether stations which can always be packed are left out of the search.
    pub remove_underconstrained: bool,
    /// Whether the neighbour bound is used to find such stations, on top of looking for
    /// unconstrained channels.
    pub underconstrained_neighbour_bound: bool,
    /// Whether the cache is also queried and filled per component.
    pub cache_components: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            component_order: ComponentOrder::LargestFirst,
            remove_underconstrained: true,
            underconstrained_neighbour_bound: true,
            cache_components: true,
        }
    }
}

/// The complete solving procedure for station packing instances.
///
/// A call to [`InstanceSolver::solve`]
/// 1. rejects instances which do not match the station data;
/// 2. asks the certifiers in order, returning the first proof (the cache comes first when one is
///    configured); certifiers which narrow the domains hand the narrowed instance to the rest;
/// 3. leaves the underconstrained stations out, solves the rest with a [`ComponentSolver`] and adds
///    them back;
/// 4. stores conclusive answers in the cache.
///
/// The pipeline holds no state of its own besides the shared cache, so one pipeline can serve
/// concurrent calls.
#[derive(Debug)]
pub struct SolverPipeline {
    stations: Arc<dyn StationManager>,
    constraints: Arc<dyn ConstraintManager>,
    certifiers: Vec<Box<dyn Certifier>>,
    solver: ComponentSolver,
    underconstrained: Option<UnderconstrainedStationFinder>,
    cache: Option<CacheView>,
}

impl SolverPipeline {
    pub fn builder(
        stations: Arc<dyn StationManager>,
        constraints: Arc<dyn ConstraintManager>,
        backend: Arc<dyn SatSolver>,
    ) -> SolverPipelineBuilder {
        SolverPipelineBuilder {
            stations,
            constraints,
            backend,
            options: PipelineOptions::default(),
            cache: None,
            certifiers: Vec::new(),
        }
    }

    pub fn certifiers(&self) -> impl Iterator<Item = &str> + '_ {
        self.certifiers.iter().map(|certifier| certifier.name())
    }

    pub fn cache(&self) -> Option<&Arc<ContainmentCache>> {
        self.cache.as_ref().map(CacheView::cache)
    }

    fn validate(&self, instance: &StationPackingInstance) -> Result<(), InputError> {
        for (&station, domain) in instance.domains().iter() {
            let known = self
                .stations
                .station_by_id(station.id())
                .map_err(|_| InputError::UnknownStation(station))?;

            if domain.is_empty() {
                return Err(InputError::EmptyDomain(station));
            }

            let global = self
                .stations
                .domain(known)
                .map_err(|_| InputError::UnknownStation(station))?;

            if let Some(&channel) = domain.iter().find(|channel| !global.contains(channel)) {
                return Err(InputError::ChannelOutsideGlobalDomain { station, channel });
            }
        }

        Ok(())
    }

    fn remember(&self, instance: &StationPackingInstance, result: &SolverResult) {
        if let Some(cache) = self.cache.as_ref() {
            if result.is_conclusive() {
                let _ = cache.insert(instance, result);
            }
        }
    }

    /// Solves `instance` without the underconstrained stations, then adds them back.
    fn solve_reduced(
        &self,
        instance: &StationPackingInstance,
        termination: &dyn TerminationCriterion,
        seed: u64,
    ) -> Result<SolverResult, SolveError> {
        let Some(finder) = self.underconstrained.as_ref() else {
            return self.solver.solve(instance, termination, seed);
        };

        let removed = finder.find(instance, self.constraints.as_ref());
        if removed.is_empty() {
            return self.solver.solve(instance, termination, seed);
        }

        let rest = instance
            .stations()
            .filter(|station| !removed.contains(station))
            .collect::<BTreeSet<Station>>();

        let result = self
            .solver
            .solve(&instance.restricted_to(&rest), termination, seed)?;

        if result.result() != SatResult::Sat {
            return Ok(result);
        }

        match finder.extend(
            instance,
            self.constraints.as_ref(),
            result.assignment(),
            &removed,
        ) {
            Some(witness) => Ok(SolverResult::sat(witness, result.runtime())),
            None => {
                warn!(
                    "Could not add the underconstrained stations of {} back, solving it in full",
                    instance.name()
                );
                let full = self.solver.solve(instance, termination, seed)?;
                Ok(full.with_added_runtime(result.runtime()))
            }
        }
    }
}

impl InstanceSolver for SolverPipeline {
    fn solve(
        &self,
        instance: &StationPackingInstance,
        termination: &dyn TerminationCriterion,
        seed: u64,
    ) -> Result<SolverResult, SolveError> {
        let stopwatch = Stopwatch::starting_now();

        self.validate(instance)?;

        if instance.is_empty() {
            return Ok(SolverResult::sat(
                Assignment::new(),
                stopwatch.elapsed_seconds(),
            ));
        }

        let mut rng = SmallRng::seed_from_u64(seed);
        let mut narrowed: Option<StationPackingInstance> = None;

        for certifier in self.certifiers.iter() {
            let certifier_seed = rng.gen();
            let current = narrowed.as_ref().unwrap_or(instance);

            match certifier.certify(current, termination, certifier_seed, &self.solver)? {
                Certification::Proved(result) => {
                    info!(
                        "{} certified {} as {}",
                        certifier.name(),
                        instance.name(),
                        result.result()
                    );

                    let result = result.with_runtime(stopwatch.elapsed_seconds());
                    self.remember(instance, &result);
                    return Ok(result);
                }
                Certification::Narrowed(smaller) => {
                    debug!("{} narrowed {}", certifier.name(), instance.name());
                    narrowed = Some(smaller);
                }
                Certification::Declined => {
                    debug!("{} declined {}", certifier.name(), instance.name());
                }
            }
        }

        let certifying_time = stopwatch.elapsed_seconds();
        let result = self
            .solve_reduced(
                narrowed.as_ref().unwrap_or(instance),
                termination,
                rng.gen(),
            )?
            .with_added_runtime(certifying_time);

        stationpack_assert_simple!(
            result.result() != SatResult::Sat || result.assignment().is_valid_for(instance)
        );

        info!(
            "{} ({} stations): {} in {:.3}s",
            instance.name(),
            instance.num_stations(),
            result.result(),
            result.runtime()
        );

        self.remember(instance, &result);
        Ok(result)
    }

    fn interrupt(&self) -> Result<(), BackendError> {
        self.solver.interrupt()
    }

    fn notify_shutdown(&self) {
        self.solver.notify_shutdown()
    }
}

/// Assembles a [`SolverPipeline`].
#[derive(Debug)]
pub struct SolverPipelineBuilder {
    stations: Arc<dyn StationManager>,
    constraints: Arc<dyn ConstraintManager>,
    backend: Arc<dyn SatSolver>,
    options: PipelineOptions,
    cache: Option<Arc<ContainmentCache>>,
    certifiers: Vec<Box<dyn Certifier>>,
}

impl SolverPipelineBuilder {
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `cache` as the first certifier and store every conclusive answer in it.
    pub fn with_cache(mut self, cache: Arc<ContainmentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Appends `certifier` to the certifiers asked before solving.
    pub fn with_certifier(mut self, certifier: impl Certifier + 'static) -> Self {
        self.certifiers.push(Box::new(certifier));
        self
    }

    /// Appends the arc consistency and previous assignment certifiers followed by the two
    /// neighbourhood certifiers.
    pub fn with_default_certifiers(self, options: NeighbourhoodOptions) -> Self {
        let constraints = Arc::clone(&self.constraints);

        self.with_certifier(ArcConsistencyCertifier::new(Arc::clone(&constraints)))
            .with_certifier(PreviousAssignmentCertifier::new(Arc::clone(&constraints)))
            .with_certifier(NeighbourhoodUnsatCertifier::new(
                Arc::clone(&constraints),
                options,
            ))
            .with_certifier(NeighbourhoodSatCertifier::new(constraints, options))
    }

    pub fn build(self) -> SolverPipeline {
        let cache = self.cache.map(|cache| {
            let context = CacheContext::new(self.stations.as_ref(), self.constraints.as_ref());
            CacheView::new(cache, context)
        });

        let mut solver = ComponentSolver::new(Arc::clone(&self.constraints), self.backend)
            .with_order(self.options.component_order);

        let mut certifiers: Vec<Box<dyn Certifier>> = Vec::new();
        if let Some(cache) = cache.as_ref() {
            certifiers.push(Box::new(ContainmentCacheCertifier::new(cache.clone())));
            if self.options.cache_components {
                solver = solver.with_cache(cache.clone());
            }
        }
        certifiers.extend(self.certifiers);

        let underconstrained = self.options.remove_underconstrained.then(|| {
            UnderconstrainedStationFinder::new(self.options.underconstrained_neighbour_bound)
        });

        SolverPipeline {
            stations: self.stations,
            constraints: self.constraints,
            certifiers,
            solver,
            underconstrained,
            cache,
        }
    }
}
