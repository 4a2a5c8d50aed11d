use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::hash::Hash;
use std::hash::Hasher;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use super::Channel;
use super::Station;

/// The per-instance domain of every station in a [`StationPackingInstance`].
pub type Domains = BTreeMap<Station, BTreeSet<Channel>>;

/// The metadata key holding the name of an instance.
pub const NAME_KEY: &str = "NAME";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InstanceError {
    #[error("station {0} has an empty domain")]
    EmptyDomain(Station),
    #[error("the previous channel {channel} of station {station} is not in its domain")]
    PreviousChannelOutsideDomain { station: Station, channel: Channel },
}

/// A single feasibility question: can every station be given a channel from its domain such that
/// no interference constraint is violated?
///
/// Besides the domains, an instance carries a previous assignment (a hint and baseline used by the
/// certifiers) and free-form metadata (e.g. a [`NAME_KEY`] used in log messages).
///
/// Two instances are equal, and hash equally, whenever their domains are equal. The previous
/// assignment and the metadata do not take part in the comparison.
///
/// The JSON form is
/// `{"domains":{"3":[3,4,5]},"previousAssignment":{"3":3},"metadata":{"NAME":"SAMPLE"}}`, where
/// `previousAssignment` and `metadata` are left out when empty.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawInstance")]
pub struct StationPackingInstance {
    domains: Domains,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    previous_assignment: BTreeMap<Station, Channel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

impl StationPackingInstance {
    /// Entries of `previous_assignment` for stations outside `domains` are dropped, so a full
    /// earlier packing can accompany a reduced set of domains.
    pub fn new(
        domains: Domains,
        mut previous_assignment: BTreeMap<Station, Channel>,
        metadata: BTreeMap<String, String>,
    ) -> Result<StationPackingInstance, InstanceError> {
        if let Some((&station, _)) = domains.iter().find(|(_, domain)| domain.is_empty()) {
            return Err(InstanceError::EmptyDomain(station));
        }

        previous_assignment.retain(|station, _| domains.contains_key(station));

        for (&station, &channel) in previous_assignment.iter() {
            if !domains[&station].contains(&channel) {
                return Err(InstanceError::PreviousChannelOutsideDomain { station, channel });
            }
        }

        Ok(StationPackingInstance {
            domains,
            previous_assignment,
            metadata,
        })
    }

    /// Create an instance without a previous assignment or metadata.
    pub fn from_domains(domains: Domains) -> Result<StationPackingInstance, InstanceError> {
        StationPackingInstance::new(domains, BTreeMap::new(), BTreeMap::new())
    }

    pub fn domains(&self) -> &Domains {
        &self.domains
    }

    pub fn domain(&self, station: Station) -> Option<&BTreeSet<Channel>> {
        self.domains.get(&station)
    }

    pub fn previous_assignment(&self) -> &BTreeMap<Station, Channel> {
        &self.previous_assignment
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn stations(&self) -> impl Iterator<Item = Station> + '_ {
        self.domains.keys().copied()
    }

    pub fn station_set(&self) -> BTreeSet<Station> {
        self.domains.keys().copied().collect()
    }

    pub fn num_stations(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn contains(&self, station: Station) -> bool {
        self.domains.contains_key(&station)
    }

    /// The name stored under [`NAME_KEY`], or a placeholder when the instance is unnamed.
    pub fn name(&self) -> &str {
        self.metadata
            .get(NAME_KEY)
            .map(String::as_str)
            .unwrap_or("unnamed")
    }

    /// Returns a copy of this instance with `key` set to `value` in its metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.metadata.insert(key.into(), value.into());
        self
    }

    /// The sub-instance over `stations`.
    ///
    /// The previous assignment is restricted to the retained stations and the metadata is copied
    /// as is. Stations not part of this instance are ignored.
    pub fn restricted_to(&self, stations: &BTreeSet<Station>) -> StationPackingInstance {
        let domains = self
            .domains
            .iter()
            .filter(|(station, _)| stations.contains(station))
            .map(|(&station, domain)| (station, domain.clone()))
            .collect();

        let previous_assignment = self
            .previous_assignment
            .iter()
            .filter(|(station, _)| stations.contains(station))
            .map(|(&station, &channel)| (station, channel))
            .collect();

        StationPackingInstance {
            domains,
            previous_assignment,
            metadata: self.metadata.clone(),
        }
    }

    /// A copy of this instance over `domains`. Previous channels which `domains` no longer allow
    /// are dropped.
    pub fn with_domains(&self, domains: Domains) -> Result<StationPackingInstance, InstanceError> {
        let previous_assignment = self
            .previous_assignment
            .iter()
            .filter(|(station, channel)| {
                domains
                    .get(station)
                    .is_some_and(|domain| domain.contains(channel))
            })
            .map(|(&station, &channel)| (station, channel))
            .collect();

        StationPackingInstance::new(domains, previous_assignment, self.metadata.clone())
    }

    /// The sub-instance of the `index`-th component of this instance. It is named
    /// `<name>_component<index>`.
    pub fn component(&self, index: usize, stations: &BTreeSet<Station>) -> StationPackingInstance {
        let name = format!("{}_component{index}", self.name());
        self.restricted_to(stations).with_metadata(NAME_KEY, name)
    }

    /// Returns a copy of this instance in which the domain of every station in `fixed` is reduced
    /// to the given channel.
    ///
    /// Fails when a fixed channel does not belong to the current domain of its station.
    pub fn with_fixed_channels(
        &self,
        fixed: &BTreeMap<Station, Channel>,
    ) -> Result<StationPackingInstance, InstanceError> {
        let mut domains = self.domains.clone();

        for (&station, &channel) in fixed.iter() {
            if let Some(domain) = domains.get_mut(&station) {
                if !domain.contains(&channel) {
                    return Err(InstanceError::PreviousChannelOutsideDomain { station, channel });
                }
                *domain = BTreeSet::from([channel]);
            }
        }

        StationPackingInstance::new(
            domains,
            self.previous_assignment.clone(),
            self.metadata.clone(),
        )
    }
}

impl PartialEq for StationPackingInstance {
    fn eq(&self, other: &Self) -> bool {
        self.domains == other.domains
    }
}

impl Eq for StationPackingInstance {}

impl Hash for StationPackingInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.domains.hash(state);
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstance {
    domains: Domains,
    #[serde(default)]
    previous_assignment: BTreeMap<Station, Channel>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl TryFrom<RawInstance> for StationPackingInstance {
    type Error = InstanceError;

    fn try_from(raw: RawInstance) -> Result<Self, Self::Error> {
        StationPackingInstance::new(raw.domains, raw.previous_assignment, raw.metadata)
    }
}
