use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use super::Channel;
use super::Station;
use super::StationPackingInstance;

/// A witness for a feasible instance: for every channel, the stations placed on it.
///
/// Serialized as a JSON object from channel to a list of stations, e.g. `{"3":["3"]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignment {
    channels: BTreeMap<Channel, BTreeSet<Station>>,
}

impl Assignment {
    pub fn new() -> Assignment {
        Assignment::default()
    }

    /// Places `station` on `channel`. A station placed twice ends up on both channels, which
    /// [`Assignment::is_valid_for`] reports.
    pub fn assign(&mut self, station: Station, channel: Channel) {
        let _ = self.channels.entry(channel).or_default().insert(station);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.values().all(BTreeSet::is_empty)
    }

    /// The number of (station, channel) placements in this assignment.
    pub fn num_placements(&self) -> usize {
        self.channels.values().map(BTreeSet::len).sum()
    }

    pub fn channels(&self) -> &BTreeMap<Channel, BTreeSet<Station>> {
        &self.channels
    }

    pub fn iter(&self) -> impl Iterator<Item = (Station, Channel)> + '_ {
        self.channels.iter().flat_map(|(&channel, stations)| {
            stations.iter().map(move |&station| (station, channel))
        })
    }

    pub fn stations(&self) -> BTreeSet<Station> {
        self.channels.values().flatten().copied().collect()
    }

    pub fn channel_of(&self, station: Station) -> Option<Channel> {
        self.channels
            .iter()
            .find(|(_, stations)| stations.contains(&station))
            .map(|(&channel, _)| channel)
    }

    /// The assignment viewed as a station to channel map. If a station was placed more than once,
    /// the highest channel wins.
    pub fn station_channels(&self) -> BTreeMap<Station, Channel> {
        self.iter().collect()
    }

    /// The assignment restricted to `stations`; channels left without stations are dropped.
    pub fn restricted_to(&self, stations: &BTreeSet<Station>) -> Assignment {
        self.iter()
            .filter(|(station, _)| stations.contains(station))
            .collect()
    }

    /// Adds every placement of `other` to this assignment.
    pub fn merge(&mut self, other: &Assignment) {
        for (station, channel) in other.iter() {
            self.assign(station, channel);
        }
    }

    /// Whether this assignment places every station of `instance` on exactly one channel of its
    /// domain, and places no other station.
    pub fn is_valid_for(&self, instance: &StationPackingInstance) -> bool {
        let mut seen = BTreeSet::new();

        for (station, channel) in self.iter() {
            let in_domain = instance
                .domain(station)
                .is_some_and(|domain| domain.contains(&channel));

            if !in_domain || !seen.insert(station) {
                return false;
            }
        }

        seen.len() == instance.num_stations()
    }
}

impl FromIterator<(Station, Channel)> for Assignment {
    fn from_iter<T: IntoIterator<Item = (Station, Channel)>>(iter: T) -> Self {
        let mut assignment = Assignment::new();
        for (station, channel) in iter {
            assignment.assign(station, channel);
        }
        assignment
    }
}
