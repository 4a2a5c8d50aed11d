use std::collections::BTreeMap;
use std::collections::BTreeSet;

use log::debug;

use crate::basic_types::Assignment;
use crate::basic_types::Channel;
use crate::basic_types::Station;
use crate::basic_types::StationPackingInstance;
use crate::data::Constraint;
use crate::data::ConstraintManager;

/// Finds stations which can always be given a channel, whatever their neighbours are assigned.
///
/// A station is underconstrained when
/// 1. one of its usable channels is not part of any constraint, or
/// 2. (with the neighbour bound enabled) summing, over its neighbours, the largest number of its
///    channels a single channel of that neighbour blocks gives less than its number of usable
///    channels.
///
/// A channel is unusable when a constraint forbids it together with itself on the same station.
/// Such stations can be left out of the search and added back to any witness of the rest with
/// [`UnderconstrainedStationFinder::extend`].
#[derive(Clone, Copy, Debug)]
pub struct UnderconstrainedStationFinder {
    neighbour_bound: bool,
}

impl Default for UnderconstrainedStationFinder {
    fn default() -> Self {
        UnderconstrainedStationFinder::new(true)
    }
}

impl UnderconstrainedStationFinder {
    pub fn new(neighbour_bound: bool) -> UnderconstrainedStationFinder {
        UnderconstrainedStationFinder { neighbour_bound }
    }

    pub fn find(
        &self,
        instance: &StationPackingInstance,
        constraints: &dyn ConstraintManager,
    ) -> BTreeSet<Station> {
        let involving = constraints_by_station(instance, constraints);
        let no_constraints = Vec::new();

        let underconstrained = instance
            .domains()
            .iter()
            .filter(|(station, domain)| {
                let constraints = involving.get(station).unwrap_or(&no_constraints);
                self.is_underconstrained(**station, domain, constraints)
            })
            .map(|(&station, _)| station)
            .collect::<BTreeSet<_>>();

        debug!(
            "{} of {} stations of {} are underconstrained",
            underconstrained.len(),
            instance.num_stations(),
            instance.name()
        );

        underconstrained
    }

    fn is_underconstrained(
        &self,
        station: Station,
        domain: &BTreeSet<Channel>,
        constraints: &[Constraint],
    ) -> bool {
        let usable = usable_channels(station, domain, constraints);
        if usable.is_empty() {
            return false;
        }

        let mut involved = BTreeSet::new();
        // For every neighbour and channel of that neighbour, the channels of `station` it blocks.
        let mut blocked: BTreeMap<(Station, Channel), BTreeSet<Channel>> = BTreeMap::new();

        for constraint in constraints.iter() {
            let (own_channel, neighbour, neighbour_channel) = match orient(station, constraint) {
                Some(oriented) => oriented,
                None => continue,
            };

            if !usable.contains(&own_channel) {
                continue;
            }

            let _ = involved.insert(own_channel);
            let _ = blocked
                .entry((neighbour, neighbour_channel))
                .or_default()
                .insert(own_channel);
        }

        if usable.iter().any(|channel| !involved.contains(channel)) {
            return true;
        }

        if !self.neighbour_bound {
            return false;
        }

        let mut worst_case_per_neighbour: BTreeMap<Station, usize> = BTreeMap::new();
        for ((neighbour, _), channels) in blocked.iter() {
            let worst = worst_case_per_neighbour.entry(*neighbour).or_default();
            *worst = (*worst).max(channels.len());
        }

        worst_case_per_neighbour.values().sum::<usize>() < usable.len()
    }

    /// Adds `removed` back to `partial`, a witness for the other stations of `instance`.
    ///
    /// Stations are placed one at a time on their previous channel if possible, otherwise on the
    /// lowest channel which violates no constraint with the stations placed so far. Returns `None`
    /// if some station cannot be placed.
    pub fn extend(
        &self,
        instance: &StationPackingInstance,
        constraints: &dyn ConstraintManager,
        partial: &Assignment,
        removed: &BTreeSet<Station>,
    ) -> Option<Assignment> {
        let involving = constraints_by_station(instance, constraints);
        let no_constraints = Vec::new();

        let mut witness = partial.clone();
        let mut placed = partial.station_channels();

        for &station in removed.iter() {
            let domain = instance.domain(station)?;
            let constraints = involving.get(&station).unwrap_or(&no_constraints);

            let previous = instance
                .previous_assignment()
                .get(&station)
                .copied()
                .filter(|channel| domain.contains(channel));

            let channel = previous
                .into_iter()
                .chain(domain.iter().copied())
                .find(|&channel| !is_blocked(station, channel, constraints, &placed))?;

            let _ = placed.insert(station, channel);
            witness.assign(station, channel);
        }

        Some(witness)
    }
}

/// The relevant constraints of `instance`, listed under both of their endpoints.
fn constraints_by_station(
    instance: &StationPackingInstance,
    constraints: &dyn ConstraintManager,
) -> BTreeMap<Station, Vec<Constraint>> {
    let mut involving: BTreeMap<Station, Vec<Constraint>> = BTreeMap::new();

    for constraint in constraints.relevant_constraints(instance.domains()) {
        involving
            .entry(constraint.source)
            .or_default()
            .push(constraint);
        if constraint.target != constraint.source {
            involving
                .entry(constraint.target)
                .or_default()
                .push(constraint);
        }
    }

    involving
}

/// Views `constraint` from `station`: its own channel, the other station and that station's
/// channel. `None` for constraints between two channels of `station` itself.
fn orient(station: Station, constraint: &Constraint) -> Option<(Channel, Station, Channel)> {
    if constraint.source == constraint.target {
        None
    } else if constraint.source == station {
        Some((
            constraint.source_channel,
            constraint.target,
            constraint.target_channel,
        ))
    } else {
        Some((
            constraint.target_channel,
            constraint.source,
            constraint.source_channel,
        ))
    }
}

fn usable_channels(
    station: Station,
    domain: &BTreeSet<Channel>,
    constraints: &[Constraint],
) -> BTreeSet<Channel> {
    domain
        .iter()
        .copied()
        .filter(|&channel| {
            !constraints.iter().any(|constraint| {
                constraint.source == station
                    && constraint.target == station
                    && constraint.source_channel == channel
                    && constraint.target_channel == channel
            })
        })
        .collect()
}

fn is_blocked(
    station: Station,
    channel: Channel,
    constraints: &[Constraint],
    placed: &BTreeMap<Station, Channel>,
) -> bool {
    constraints.iter().any(|constraint| {
        if constraint.source == station && constraint.target == station {
            return constraint.source_channel == channel && constraint.target_channel == channel;
        }

        match orient(station, constraint) {
            Some((own, neighbour, neighbour_channel)) => {
                own == channel && placed.get(&neighbour) == Some(&neighbour_channel)
            }
            None => false,
        }
    })
}
