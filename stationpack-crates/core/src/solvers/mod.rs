//! Solving whole instances.
//!
//! [`ComponentSolver`] is the core procedure: it splits an instance into the components of its
//! constraint graph, encodes each one, hands it to a [`SatSolver`] and joins the answers.
//! [`SolverPipeline`] puts input validation, the [`Certifier`] chain, underconstrained station
//! removal and the [`ContainmentCache`] around it.
//!
//! [`SatSolver`]: crate::sat::backend::SatSolver
//! [`ContainmentCache`]: crate::cache::ContainmentCache
use std::fmt::Debug;

use thiserror::Error;

use crate::basic_types::Channel;
use crate::basic_types::SolverResult;
use crate::basic_types::Station;
use crate::basic_types::StationPackingInstance;
use crate::sat::backend::BackendError;
use crate::sat::DecodeError;
use crate::termination::TerminationCriterion;

pub mod certifiers;
mod component;
mod pipeline;
mod underconstrained;

pub use certifiers::Certification;
pub use certifiers::Certifier;
pub use component::ComponentSolver;
pub use pipeline::PipelineOptions;
pub use pipeline::SolverPipeline;
pub use pipeline::SolverPipelineBuilder;
pub use underconstrained::UnderconstrainedStationFinder;

/// An instance which cannot be solved because it does not match the station data.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    #[error("station {0} is not known")]
    UnknownStation(Station),
    #[error("station {0} has an empty domain")]
    EmptyDomain(Station),
    #[error("channel {channel} is not in the domain of station {station}")]
    ChannelOutsideGlobalDomain { station: Station, channel: Channel },
}

/// The failures of a solve call. Timeouts, crashes and interruptions are not failures; they are
/// reported as a [`SolverResult`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    #[error("invalid instance")]
    Input(#[from] InputError),
    #[error("the backend reported a model which is not a witness")]
    Decode(#[from] DecodeError),
}

/// Decides whole instances.
pub trait InstanceSolver: Debug + Send + Sync {
    /// Decides `instance` within `termination`. A SAT result carries a witness for every station
    /// of the instance.
    fn solve(
        &self,
        instance: &StationPackingInstance,
        termination: &dyn TerminationCriterion,
        seed: u64,
    ) -> Result<SolverResult, SolveError>;

    /// Asks the backend to stop the solve calls currently running.
    fn interrupt(&self) -> Result<(), BackendError>;

    /// Releases the backend. Idempotent.
    fn notify_shutdown(&self);
}
