use std::time::Instant;

/// Measures wall-clock seconds since construction, as used for [`SolverResult`] runtimes.
///
/// [`SolverResult`]: crate::SolverResult
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    started_at: Instant,
}

impl Stopwatch {
    pub fn starting_now() -> Stopwatch {
        Stopwatch {
            started_at: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
