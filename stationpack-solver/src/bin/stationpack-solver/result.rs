use stationpack_solver::data::DataError;
use stationpack_solver::solvers::SolveError;
use thiserror::Error;

pub(crate) type StationPackResult<T> = Result<T, StationPackError>;

#[derive(Error, Debug)]
pub(crate) enum StationPackError {
    #[error("IO error, more details: {0}")]
    IOError(#[from] std::io::Error),
    #[error("The instance file is not valid JSON, more details: {0}")]
    InvalidInstance(#[from] serde_json::Error),
    #[error("Failed to load the station data, more details: {0}")]
    InvalidData(#[from] DataError),
    #[error("Failed to solve the instance, more details: {0}")]
    Solve(#[from] SolveError),
    #[error("The external backend needs a solver executable, pass one with --external-solver.")]
    MissingExternalSolver,
    #[cfg(not(feature = "ipasir"))]
    #[error("The {0} backend is not available in this build.")]
    BackendUnavailable(&'static str),
}
