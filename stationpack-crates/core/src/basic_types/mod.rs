mod assignment;
mod hash_structures;
mod instance;
pub(crate) mod sequence_generators;
mod solver_result;
mod station;
mod stopwatch;

pub use assignment::Assignment;
pub use hash_structures::*;
pub use instance::Domains;
pub use instance::InstanceError;
pub use instance::StationPackingInstance;
pub use instance::NAME_KEY;
pub use solver_result::SatResult;
pub use solver_result::SolverResult;
pub use solver_result::SolverResultError;
pub use station::Channel;
pub use station::Station;
pub use stopwatch::Stopwatch;
