//! A backend over any SAT solver library implementing the IPASIR interface, linked as
//! `libipasir`.
use std::ffi::c_int;
use std::ffi::c_void;
use std::num::NonZeroU64;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::debug;

use super::solve_with_library;
use super::BackendError;
use super::IncrementalSatLibrary;
use super::InterruptRegistry;
use super::SatSolver;
use super::SatSolverResult;
use crate::basic_types::SatResult;
use crate::sat::Cnf;
use crate::termination::TerminationCriterion;

#[repr(C)]
struct IpasirHandle {
    _private: [u8; 0],
}

type TerminateCallback = extern "C" fn(data: *mut c_void) -> c_int;

#[link(name = "ipasir")]
extern "C" {
    fn ipasir_init() -> *mut IpasirHandle;
    fn ipasir_release(solver: *mut IpasirHandle);
    fn ipasir_add(solver: *mut IpasirHandle, lit_or_zero: i32);
    fn ipasir_assume(solver: *mut IpasirHandle, lit: i32);
    fn ipasir_solve(solver: *mut IpasirHandle) -> c_int;
    fn ipasir_val(solver: *mut IpasirHandle, lit: i32) -> i32;
    fn ipasir_set_terminate(
        solver: *mut IpasirHandle,
        data: *mut c_void,
        terminate: Option<TerminateCallback>,
    );
}

const IPASIR_SAT: c_int = 10;
const IPASIR_UNSAT: c_int = 20;
const IPASIR_INTERRUPTED: c_int = 0;

/// The state read by the terminate callback during one `ipasir_solve` call.
struct CallbackData<'a> {
    termination: &'a dyn TerminationCriterion,
    interrupt: &'a AtomicBool,
}

extern "C" fn terminate(data: *mut c_void) -> c_int {
    // SAFETY: the pointer is set to a `CallbackData` on the stack of `solve_with_assumptions`
    // and the callback is removed before that frame returns.
    let data = unsafe { &*(data as *const CallbackData<'_>) };
    c_int::from(data.interrupt.load(Ordering::Relaxed) || data.termination.has_expired())
}

/// One instance of the linked IPASIR solver. Released when dropped.
#[derive(Debug)]
pub struct IpasirSolver {
    handle: *mut IpasirHandle,
    interrupt: Arc<AtomicBool>,
}

impl IpasirSolver {
    pub fn new(interrupt: Arc<AtomicBool>) -> Option<IpasirSolver> {
        // SAFETY: `ipasir_init` has no preconditions.
        let handle = unsafe { ipasir_init() };
        if handle.is_null() {
            None
        } else {
            Some(IpasirSolver { handle, interrupt })
        }
    }

    fn code(variable: NonZeroU64) -> Option<i32> {
        i32::try_from(variable.get()).ok()
    }
}

impl Drop for IpasirSolver {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by `ipasir_init` and is released exactly once.
        unsafe { ipasir_release(self.handle) };
    }
}

impl IncrementalSatLibrary for IpasirSolver {
    fn add_clause(&mut self, positive: &[NonZeroU64], negative: &[NonZeroU64]) -> bool {
        let Some(codes) = positive
            .iter()
            .map(|&v| IpasirSolver::code(v))
            .chain(negative.iter().map(|&v| IpasirSolver::code(v).map(|c| -c)))
            .collect::<Option<Vec<_>>>()
        else {
            return false;
        };

        for code in codes {
            // SAFETY: the handle is valid for the lifetime of `self`.
            unsafe { ipasir_add(self.handle, code) };
        }
        // SAFETY: as above; zero terminates the clause.
        unsafe { ipasir_add(self.handle, 0) };

        true
    }

    fn solve_with_assumptions(
        &mut self,
        assumed_true: &[NonZeroU64],
        assumed_false: &[NonZeroU64],
        termination: &dyn TerminationCriterion,
    ) -> SatResult {
        let Some(assumptions) = assumed_true
            .iter()
            .map(|&v| IpasirSolver::code(v))
            .chain(assumed_false.iter().map(|&v| IpasirSolver::code(v).map(|c| -c)))
            .collect::<Option<Vec<_>>>()
        else {
            return SatResult::Crashed;
        };

        for code in assumptions {
            // SAFETY: the handle is valid for the lifetime of `self`.
            unsafe { ipasir_assume(self.handle, code) };
        }

        let data = CallbackData {
            termination,
            interrupt: &self.interrupt,
        };

        // SAFETY: `data` outlives the solve call, and the callback is unset before it is dropped.
        let status = unsafe {
            ipasir_set_terminate(
                self.handle,
                &data as *const CallbackData<'_> as *mut c_void,
                Some(terminate),
            );
            let status = ipasir_solve(self.handle);
            ipasir_set_terminate(self.handle, std::ptr::null_mut(), None);
            status
        };

        match status {
            IPASIR_SAT => SatResult::Sat,
            IPASIR_UNSAT => SatResult::Unsat,
            IPASIR_INTERRUPTED if self.interrupt.load(Ordering::Relaxed) => SatResult::Killed,
            IPASIR_INTERRUPTED => SatResult::Timeout,
            _ => SatResult::Crashed,
        }
    }

    fn value(&self, variable: NonZeroU64) -> Option<bool> {
        let code = IpasirSolver::code(variable)?;
        // SAFETY: only called after a satisfiable solve call, as the interface requires.
        let value = unsafe { ipasir_val(self.handle, code) };
        (value != 0).then_some(value > 0)
    }
}

/// A [`SatSolver`] which decides every formula with a fresh [`IpasirSolver`].
#[derive(Debug, Default)]
pub struct IpasirBackend {
    running: InterruptRegistry,
    shut_down: AtomicBool,
}

impl IpasirBackend {
    pub fn new() -> IpasirBackend {
        IpasirBackend::default()
    }
}

impl SatSolver for IpasirBackend {
    fn name(&self) -> &str {
        "ipasir"
    }

    fn solve(
        &self,
        cnf: &Cnf,
        termination: &dyn TerminationCriterion,
        _seed: u64,
    ) -> SatSolverResult {
        if self.shut_down.load(Ordering::Relaxed) {
            return SatSolverResult::without_model(SatResult::Crashed, 0.0);
        }

        let registration = self.running.register();
        let Some(mut solver) = IpasirSolver::new(registration.flag()) else {
            debug!("ipasir: failed to create a solver");
            return SatSolverResult::without_model(SatResult::Crashed, 0.0);
        };

        solve_with_library(&mut solver, cnf, termination)
    }

    fn interrupt(&self) -> Result<(), BackendError> {
        self.running.interrupt_all();
        Ok(())
    }

    fn notify_shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::Relaxed) {
            self.running.interrupt_all();
        }
    }
}
