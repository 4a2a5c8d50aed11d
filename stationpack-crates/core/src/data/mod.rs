//! The station and interference data the pipeline consumes.
//!
//! The pipeline only relies on the [`StationManager`] and [`ConstraintManager`] traits and treats
//! them as read-only. [`DomainStationManager`] and [`ChannelSpecificConstraintManager`] are
//! in-memory implementations loaded from the usual CSV files.
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Debug;

use thiserror::Error;

use crate::basic_types::Channel;
use crate::basic_types::Domains;
use crate::basic_types::Station;

mod channel_specific;
mod domain_station_manager;

pub use channel_specific::ChannelSpecificConstraintManager;
pub use channel_specific::ConstraintKey;
pub use domain_station_manager::DomainStationManager;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read data file")]
    Io(#[from] std::io::Error),
    #[error("station {0} is not known")]
    UnknownStation(u32),
    #[error("station {0} has an empty domain")]
    EmptyDomain(u32),
    #[error("station {0} is defined more than once")]
    DuplicateStation(u32),
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("line {line}: '{key}' is not a supported constraint key")]
    UnsupportedConstraintKey { line: usize, key: String },
    #[error("line {line}: low channel {low} is greater than high channel {high}")]
    InvalidChannelRange { line: usize, low: Channel, high: Channel },
}

/// A forbidden pair of simultaneous assignments: `source` on `source_channel` together with
/// `target` on `target_channel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Constraint {
    pub source: Station,
    pub source_channel: Channel,
    pub target: Station,
    pub target_channel: Channel,
}

impl Constraint {
    pub fn new(
        source: Station,
        source_channel: Channel,
        target: Station,
        target_channel: Channel,
    ) -> Constraint {
        Constraint {
            source,
            source_channel,
            target,
            target_channel,
        }
    }

    /// Whether both endpoints are allowed by `domains`.
    pub fn applies_to(&self, domains: &Domains) -> bool {
        let allowed = |station: &Station, channel: &Channel| {
            domains
                .get(station)
                .is_some_and(|domain| domain.contains(channel))
        };

        allowed(&self.source, &self.source_channel) && allowed(&self.target, &self.target_channel)
    }

    /// Whether `assignment` places both endpoints as forbidden.
    pub fn is_violated_by(&self, assignment: &BTreeMap<Station, Channel>) -> bool {
        assignment.get(&self.source) == Some(&self.source_channel)
            && assignment.get(&self.target) == Some(&self.target_channel)
    }
}

/// Access to the stations known to the process and their global domains.
pub trait StationManager: Debug + Send + Sync {
    fn stations(&self) -> BTreeSet<Station>;

    /// The global domain of `station`.
    fn domain(&self, station: Station) -> Result<&BTreeSet<Channel>, DataError>;

    fn station_by_id(&self, id: u32) -> Result<Station, DataError>;

    /// A deterministic digest of the station data.
    fn fingerprint(&self) -> String;
}

/// Access to the pairwise interference constraints.
pub trait ConstraintManager: Debug + Send + Sync {
    /// Every constraint, over all channels, between two stations of `stations`.
    fn interference_constraints(&self, stations: &BTreeSet<Station>) -> Vec<Constraint>;

    /// A deterministic digest of the constraint data.
    fn fingerprint(&self) -> String;

    /// The constraints both of whose endpoints are allowed by `domains`.
    fn relevant_constraints(&self, domains: &Domains) -> Vec<Constraint> {
        let stations = domains.keys().copied().collect();
        self.interference_constraints(&stations)
            .into_iter()
            .filter(|constraint| constraint.applies_to(domains))
            .collect()
    }

    /// Whether `assignment` violates none of the constraints between its stations.
    fn is_satisfying_assignment(&self, assignment: &BTreeMap<Station, Channel>) -> bool {
        let stations = assignment.keys().copied().collect();
        self.interference_constraints(&stations)
            .iter()
            .all(|constraint| !constraint.is_violated_by(assignment))
    }
}

/// Splits a CSV line into trimmed cells, dropping trailing empty cells.
fn csv_cells(line: &str) -> Vec<&str> {
    let mut cells = line.split(',').map(str::trim).collect::<Vec<_>>();
    while cells.last().is_some_and(|cell| cell.is_empty()) {
        let _ = cells.pop();
    }
    cells
}

fn parse_cell<T: std::str::FromStr>(cell: &str, line: usize, what: &str) -> Result<T, DataError> {
    cell.parse::<T>().map_err(|_| DataError::Malformed {
        line,
        message: format!("'{cell}' is not a valid {what}"),
    })
}
