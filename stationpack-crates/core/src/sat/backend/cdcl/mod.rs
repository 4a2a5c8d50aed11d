//! The in-process backend.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use log::debug;

use super::solve_with_library;
use super::BackendError;
use super::InterruptRegistry;
use super::SatSolver;
use super::SatSolverResult;
use crate::basic_types::SatResult;
use crate::sat::Cnf;
use crate::termination::TerminationCriterion;

mod solver;

pub use solver::CdclSolver;

/// Options of the [`CdclSolver`].
#[derive(Clone, Copy, Debug)]
pub struct CdclOptions {
    /// The number of conflicts in a unit of the Luby restart sequence.
    pub restart_base: u64,
    /// The factor by which variable activities decay after every conflict.
    pub activity_decay: f64,
    /// The termination criterion and interrupt flag are checked every this many conflicts.
    pub conflict_polling_interval: u64,
    /// The termination criterion and interrupt flag are checked every this many decisions.
    pub decision_polling_interval: u64,
}

impl Default for CdclOptions {
    fn default() -> Self {
        CdclOptions {
            restart_base: 100,
            activity_decay: 0.95,
            conflict_polling_interval: 64,
            decision_polling_interval: 256,
        }
    }
}

/// A [`SatSolver`] which decides every formula with a fresh [`CdclSolver`] in the calling
/// thread. Supports interruption of the calls that are running.
#[derive(Debug, Default)]
pub struct CdclBackend {
    options: CdclOptions,
    running: InterruptRegistry,
    shut_down: AtomicBool,
}

impl CdclBackend {
    pub fn new(options: CdclOptions) -> CdclBackend {
        CdclBackend {
            options,
            running: InterruptRegistry::default(),
            shut_down: AtomicBool::new(false),
        }
    }
}

impl SatSolver for CdclBackend {
    fn name(&self) -> &str {
        "cdcl"
    }

    fn solve(
        &self,
        cnf: &Cnf,
        termination: &dyn TerminationCriterion,
        seed: u64,
    ) -> SatSolverResult {
        if self.shut_down.load(Ordering::Relaxed) {
            return SatSolverResult::without_model(SatResult::Crashed, 0.0);
        }

        let registration = self.running.register();
        let mut solver = CdclSolver::new(self.options, seed, registration.flag());
        let result = solve_with_library(&mut solver, cnf, termination);

        debug!(
            "cdcl: {} in {:.3}s ({} conflicts, {} decisions)",
            result.result(),
            result.runtime(),
            solver.num_conflicts(),
            solver.num_decisions()
        );

        result
    }

    fn interrupt(&self) -> Result<(), BackendError> {
        self.running.interrupt_all();
        Ok(())
    }

    fn notify_shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::Relaxed) {
            debug!("cdcl: shutting down");
            self.running.interrupt_all();
        }
    }
}
