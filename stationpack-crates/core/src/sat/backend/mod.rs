//! The boundary between the pipeline and the procedures which decide a [`Cnf`].
//!
//! A [`SatSolver`] consumes one formula per call and reports a [`SatSolverResult`]. It may run
//! in-process ([`CdclBackend`]), in a separate process ([`ExternalProcessBackend`]) or through a
//! native library (`IpasirBackend`, behind the `ipasir` feature).
//!
//! Incremental solvers are modelled by [`IncrementalSatLibrary`], which mirrors the usual native
//! interface: clauses are added one at a time and each solve call may carry assumptions.
use std::fmt::Debug;
use std::num::NonZeroU64;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use thiserror::Error;

use super::Cnf;
use super::Literal;
use crate::basic_types::SatResult;
use crate::basic_types::Stopwatch;
use crate::termination::TerminationCriterion;

mod cdcl;
#[cfg(feature = "ipasir")]
mod ipasir;
mod process;

pub use cdcl::CdclBackend;
pub use cdcl::CdclOptions;
pub use cdcl::CdclSolver;
#[cfg(feature = "ipasir")]
pub use ipasir::IpasirBackend;
#[cfg(feature = "ipasir")]
pub use ipasir::IpasirSolver;
pub use process::ExternalProcessBackend;
pub use process::SEED_PLACEHOLDER;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend '{backend}' does not support interruption")]
    InterruptUnsupported { backend: String },
    #[error("backend '{backend}' has been shut down")]
    ShutDown { backend: String },
    #[error("failed to stop the solver process")]
    Io(#[from] std::io::Error),
}

/// The outcome of deciding one formula.
///
/// The model is non-empty only for [`SatResult::Sat`]; it lists a literal for every variable the
/// backend assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct SatSolverResult {
    result: SatResult,
    runtime: f64,
    model: Vec<Literal>,
}

impl SatSolverResult {
    pub fn new(result: SatResult, runtime: f64, model: Vec<Literal>) -> SatSolverResult {
        let model = if result == SatResult::Sat {
            model
        } else {
            Vec::new()
        };

        SatSolverResult {
            result,
            runtime: runtime.max(0.0),
            model,
        }
    }

    pub fn without_model(result: SatResult, runtime: f64) -> SatSolverResult {
        SatSolverResult::new(result, runtime, Vec::new())
    }

    pub fn result(&self) -> SatResult {
        self.result
    }

    /// Wall-clock seconds spent by the backend.
    pub fn runtime(&self) -> f64 {
        self.runtime
    }

    pub fn model(&self) -> &[Literal] {
        &self.model
    }
}

/// A procedure deciding CNF formulas under a time budget.
///
/// Implementations are shared between threads: [`SatSolver::interrupt`] and
/// [`SatSolver::notify_shutdown`] may be called while another thread is inside
/// [`SatSolver::solve`].
pub trait SatSolver: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Decides `cnf`. Returns [`SatResult::Timeout`] once `termination` expires and
    /// [`SatResult::Killed`] when interrupted. Failures of the backend itself are reported as
    /// [`SatResult::Crashed`].
    fn solve(
        &self,
        cnf: &Cnf,
        termination: &dyn TerminationCriterion,
        seed: u64,
    ) -> SatSolverResult;

    /// Asks the solve calls currently running to stop as soon as possible.
    ///
    /// Backends which cannot be stopped report [`BackendError::InterruptUnsupported`].
    fn interrupt(&self) -> Result<(), BackendError> {
        Err(BackendError::InterruptUnsupported {
            backend: self.name().to_owned(),
        })
    }

    /// Releases the resources of the backend. Later solve calls report
    /// [`SatResult::Crashed`]. Calling it more than once has no further effect.
    fn notify_shutdown(&self) {}
}

/// The interface of an incremental SAT library.
///
/// Variables are given as positive integers; a clause is split into the variables occurring
/// positively and those occurring negated.
pub trait IncrementalSatLibrary: Debug {
    /// Adds the clause `positive ∨ ¬negative`. Returns `false` only when the input is rejected,
    /// not when the formula becomes unsatisfiable.
    fn add_clause(&mut self, positive: &[NonZeroU64], negative: &[NonZeroU64]) -> bool;

    /// Decides the clauses added so far under the assumption that the variables of
    /// `assumed_true` are true and those of `assumed_false` are false.
    fn solve_with_assumptions(
        &mut self,
        assumed_true: &[NonZeroU64],
        assumed_false: &[NonZeroU64],
        termination: &dyn TerminationCriterion,
    ) -> SatResult;

    /// Decides the clauses added so far, without assumptions.
    fn solve(&mut self, termination: &dyn TerminationCriterion) -> SatResult {
        self.solve_with_assumptions(&[], &[], termination)
    }

    /// The value of `variable` in the model found by the last satisfiable solve call.
    fn value(&self, variable: NonZeroU64) -> Option<bool>;

    /// Suggests the polarity to try first for the variable of `literal`.
    fn set_phase(&mut self, _literal: Literal) {}
}

/// Runs `cnf` through a fresh incremental library, reading back the model over the variables of
/// the formula.
pub(crate) fn solve_with_library(
    library: &mut dyn IncrementalSatLibrary,
    cnf: &Cnf,
    termination: &dyn TerminationCriterion,
) -> SatSolverResult {
    let stopwatch = Stopwatch::starting_now();

    for clause in cnf.clauses() {
        let (positive, negative): (Vec<Literal>, Vec<Literal>) = clause
            .literals()
            .iter()
            .copied()
            .partition(|literal| literal.is_positive());

        let positive = positive.iter().map(|l| l.variable()).collect::<Vec<_>>();
        let negative = negative.iter().map(|l| l.variable()).collect::<Vec<_>>();

        if !library.add_clause(&positive, &negative) {
            return SatSolverResult::without_model(
                SatResult::Crashed,
                stopwatch.elapsed_seconds(),
            );
        }
    }

    for &hint in cnf.phase_hints() {
        library.set_phase(hint);
    }

    let result = library.solve(termination);

    let model = if result == SatResult::Sat {
        cnf.variables()
            .into_iter()
            .map(|variable| Literal::new(variable, library.value(variable).unwrap_or(false)))
            .collect()
    } else {
        Vec::new()
    };

    SatSolverResult::new(result, stopwatch.elapsed_seconds(), model)
}

/// The interrupt flags of the solve calls currently running in one backend.
#[derive(Debug, Default)]
pub(crate) struct InterruptRegistry {
    next_id: AtomicU64,
    running: Mutex<Vec<(u64, Arc<AtomicBool>)>>,
}

impl InterruptRegistry {
    /// Registers a new solve call. The returned guard unregisters it when dropped.
    pub(crate) fn register(&self) -> Registration<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let flag = Arc::new(AtomicBool::new(false));

        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::clone(&flag)));

        Registration {
            registry: self,
            id,
            flag,
        }
    }

    /// Raises the flag of every running solve call.
    pub(crate) fn interrupt_all(&self) {
        for (_, flag) in self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            flag.store(true, Ordering::Relaxed);
        }
    }

    #[cfg(test)]
    pub(crate) fn num_running(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug)]
pub(crate) struct Registration<'a> {
    registry: &'a InterruptRegistry,
    id: u64,
    flag: Arc<AtomicBool>,
}

impl Registration<'_> {
    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroI64;

    use super::*;
    use crate::sat::Clause;
    use crate::termination::Indefinite;

    /// Remembers the clauses it is given and reports every variable as true.
    #[derive(Debug, Default)]
    struct Recording {
        clauses: Vec<(Vec<u64>, Vec<u64>)>,
        phases: Vec<Literal>,
    }

    impl IncrementalSatLibrary for Recording {
        fn add_clause(&mut self, positive: &[NonZeroU64], negative: &[NonZeroU64]) -> bool {
            self.clauses.push((
                positive.iter().map(|v| v.get()).collect(),
                negative.iter().map(|v| v.get()).collect(),
            ));
            true
        }

        fn solve_with_assumptions(
            &mut self,
            _assumed_true: &[NonZeroU64],
            _assumed_false: &[NonZeroU64],
            _termination: &dyn TerminationCriterion,
        ) -> SatResult {
            SatResult::Sat
        }

        fn value(&self, _variable: NonZeroU64) -> Option<bool> {
            Some(true)
        }

        fn set_phase(&mut self, literal: Literal) {
            self.phases.push(literal);
        }
    }

    fn lit(code: i64) -> Literal {
        Literal::from_dimacs(NonZeroI64::new(code).unwrap())
    }

    #[test]
    fn clauses_reach_the_library_split_by_sign() {
        let mut cnf: Cnf = [
            Clause::new([lit(1), lit(-2), lit(3)]),
            Clause::new([lit(-1), lit(-3)]),
        ]
        .into_iter()
        .collect();
        cnf.set_phase_hints(vec![lit(-2)]);

        let mut library = Recording::default();
        let result = solve_with_library(&mut library, &cnf, &Indefinite);

        assert_eq!(
            library.clauses,
            vec![(vec![1, 3], vec![2]), (vec![], vec![1, 3])]
        );
        assert_eq!(library.phases, vec![lit(-2)]);
        assert_eq!(result.result(), SatResult::Sat);
        assert_eq!(result.model(), &[lit(1), lit(2), lit(3)]);
    }

    #[test]
    fn registrations_are_removed_when_dropped() {
        let registry = InterruptRegistry::default();
        let first = registry.register();
        {
            let _second = registry.register();
            assert_eq!(registry.num_running(), 2);
        }
        assert_eq!(registry.num_running(), 1);

        registry.interrupt_all();
        assert!(first.is_interrupted());
        drop(first);
        assert_eq!(registry.num_running(), 0);
    }

    #[test]
    fn models_are_only_kept_for_satisfiable_results() {
        let literal = Literal::positive(NonZeroU64::MIN);
        assert!(SatSolverResult::new(SatResult::Unsat, 1.0, vec![literal])
            .model()
            .is_empty());
        assert_eq!(
            SatSolverResult::new(SatResult::Sat, -1.0, vec![literal]).runtime(),
            0.0
        );
    }
}
