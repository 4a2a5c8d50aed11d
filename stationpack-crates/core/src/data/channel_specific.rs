use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::hash::Hasher;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::str::FromStr;

use fnv::FnvHasher;
use log::debug;

use super::csv_cells;
use super::parse_cell;
use super::Constraint;
use super::ConstraintManager;
use super::DataError;
use super::StationManager;
use crate::basic_types::Channel;
use crate::basic_types::Station;

/// The kinds of interference in the compact constraint format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintKey {
    /// Subject on `c` interferes with target on `c`.
    Co,
    /// Subject on `c` interferes with target on `c + 1`.
    AdjPlusOne,
    /// Subject on `c` interferes with target on `c + 2`.
    AdjPlusTwo,
}

impl ConstraintKey {
    fn offset(self) -> Channel {
        match self {
            ConstraintKey::Co => 0,
            ConstraintKey::AdjPlusOne => 1,
            ConstraintKey::AdjPlusTwo => 2,
        }
    }
}

impl FromStr for ConstraintKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CO" => Ok(ConstraintKey::Co),
            "ADJ+1" => Ok(ConstraintKey::AdjPlusOne),
            "ADJ+2" => Ok(ConstraintKey::AdjPlusTwo),
            _ => Err(()),
        }
    }
}

/// A [`ConstraintManager`] storing channel specific interference.
///
/// The CSV form has lines `KEY,lowChannel,highChannel,subjectId,targetId,targetId,...`, one
/// constraint per subject channel in `low..=high` and target. Adjacent channel keys imply the
/// weaker ones: `ADJ+1` on `c` adds `CO` on `c` and `c + 1`, `ADJ+2` on `c` adds `CO` on
/// `c..=c + 2` and `ADJ+1` on `c` and `c + 1`.
#[derive(Clone, Debug, Default)]
pub struct ChannelSpecificConstraintManager {
    /// Constraints indexed by their source station.
    constraints: BTreeMap<Station, BTreeSet<Constraint>>,
    fingerprint: String,
}

impl ChannelSpecificConstraintManager {
    pub fn new() -> Self {
        let mut manager = ChannelSpecificConstraintManager::default();
        manager.fingerprint = manager.compute_fingerprint();
        manager
    }

    /// Reads the CSV form; every station id must be known to `stations`.
    pub fn from_csv(
        source: impl Read,
        stations: &dyn StationManager,
    ) -> Result<ChannelSpecificConstraintManager, DataError> {
        let mut manager = ChannelSpecificConstraintManager::default();

        for (index, line) in BufReader::new(source).lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            let cells = csv_cells(&line);
            if cells.is_empty() {
                continue;
            }

            if cells.len() < 5 {
                return Err(DataError::Malformed {
                    line: line_number,
                    message: "expected KEY,low,high,subject,target...".to_owned(),
                });
            }

            let key = cells[0]
                .parse::<ConstraintKey>()
                .map_err(|_| DataError::UnsupportedConstraintKey {
                    line: line_number,
                    key: cells[0].to_owned(),
                })?;
            let low = parse_cell::<Channel>(cells[1], line_number, "channel")?;
            let high = parse_cell::<Channel>(cells[2], line_number, "channel")?;
            if low > high {
                return Err(DataError::InvalidChannelRange {
                    line: line_number,
                    low,
                    high,
                });
            }

            let subject =
                stations.station_by_id(parse_cell(cells[3], line_number, "station id")?)?;
            let targets = cells[4..]
                .iter()
                .take_while(|cell| !cell.is_empty())
                .map(|cell| {
                    parse_cell::<u32>(cell, line_number, "station id")
                        .and_then(|id| stations.station_by_id(id))
                })
                .collect::<Result<Vec<_>, _>>()?;

            for channel in low..=high {
                for &target in targets.iter() {
                    manager.add_constraint(subject, target, channel, key);
                }
            }
        }

        manager.fingerprint = manager.compute_fingerprint();
        debug!(
            "Read {} interference constraints",
            manager.constraints.values().map(BTreeSet::len).sum::<usize>()
        );
        Ok(manager)
    }

    /// Adds the constraint `key` between `subject` on `channel` and `target`, together with the
    /// constraints it implies.
    pub fn add_constraint(
        &mut self,
        subject: Station,
        target: Station,
        channel: Channel,
        key: ConstraintKey,
    ) {
        self.insert(subject, target, channel, key);

        match key {
            ConstraintKey::Co => {}
            ConstraintKey::AdjPlusOne => {
                self.insert(subject, target, channel, ConstraintKey::Co);
                self.insert(subject, target, channel + 1, ConstraintKey::Co);
            }
            ConstraintKey::AdjPlusTwo => {
                for offset in 0..=2 {
                    self.insert(subject, target, channel + offset, ConstraintKey::Co);
                }
                self.insert(subject, target, channel, ConstraintKey::AdjPlusOne);
                self.insert(subject, target, channel + 1, ConstraintKey::AdjPlusOne);
            }
        }

        self.fingerprint = self.compute_fingerprint();
    }

    fn insert(&mut self, subject: Station, target: Station, channel: Channel, key: ConstraintKey) {
        // Co-channel interference is symmetric, store it once with the lower id as source.
        let (source, target) = if key == ConstraintKey::Co && subject > target {
            (target, subject)
        } else {
            (subject, target)
        };

        let constraint = Constraint::new(source, channel, target, channel + key.offset());
        let _ = self.constraints.entry(source).or_default().insert(constraint);
    }

    fn compute_fingerprint(&self) -> String {
        let mut hasher = FnvHasher::default();
        for constraint in self.constraints.values().flatten() {
            hasher.write_u32(constraint.source.id());
            hasher.write_u32(constraint.source_channel);
            hasher.write_u32(constraint.target.id());
            hasher.write_u32(constraint.target_channel);
        }
        format!("{:016x}", hasher.finish())
    }
}

impl ConstraintManager for ChannelSpecificConstraintManager {
    fn interference_constraints(&self, stations: &BTreeSet<Station>) -> Vec<Constraint> {
        stations
            .iter()
            .filter_map(|station| self.constraints.get(station))
            .flatten()
            .filter(|constraint| stations.contains(&constraint.target))
            .copied()
            .collect()
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::DomainStationManager;

    fn s(id: u32) -> Station {
        Station::new(id)
    }

    fn stations() -> DomainStationManager {
        DomainStationManager::from_csv("D,1,1,2,3,4\nD,2,1,2,3,4\nD,3,1,2,3,4\n".as_bytes())
            .unwrap()
    }

    #[test]
    fn co_constraints_are_stored_once() {
        let manager = ChannelSpecificConstraintManager::from_csv(
            "CO,1,1,2,1\nCO,1,1,1,2\n".as_bytes(),
            &stations(),
        )
        .unwrap();

        let constraints = manager.interference_constraints(&BTreeSet::from([s(1), s(2)]));
        assert_eq!(constraints, vec![Constraint::new(s(1), 1, s(2), 1)]);
    }

    #[test]
    fn adjacent_constraints_imply_co_channel_ones() {
        let manager =
            ChannelSpecificConstraintManager::from_csv("ADJ+1,2,2,1,2\n".as_bytes(), &stations())
                .unwrap();

        let constraints = manager
            .interference_constraints(&BTreeSet::from([s(1), s(2)]))
            .into_iter()
            .collect::<BTreeSet<_>>();
        assert_eq!(
            constraints,
            BTreeSet::from([
                Constraint::new(s(1), 2, s(2), 3),
                Constraint::new(s(1), 2, s(2), 2),
                Constraint::new(s(1), 3, s(2), 3),
            ])
        );
    }

    #[test]
    fn adj_plus_two_implies_adj_plus_one_and_co() {
        let mut manager = ChannelSpecificConstraintManager::new();
        manager.add_constraint(s(2), s(1), 1, ConstraintKey::AdjPlusTwo);

        let constraints = manager
            .interference_constraints(&BTreeSet::from([s(1), s(2)]))
            .into_iter()
            .collect::<BTreeSet<_>>();
        assert_eq!(
            constraints,
            BTreeSet::from([
                Constraint::new(s(2), 1, s(1), 3),
                Constraint::new(s(2), 1, s(1), 2),
                Constraint::new(s(2), 2, s(1), 3),
                Constraint::new(s(1), 1, s(2), 1),
                Constraint::new(s(1), 2, s(2), 2),
                Constraint::new(s(1), 3, s(2), 3),
            ])
        );
    }

    #[test]
    fn constraints_outside_the_station_set_are_ignored() {
        let manager =
            ChannelSpecificConstraintManager::from_csv("CO,1,4,1,2,3\n".as_bytes(), &stations())
                .unwrap();

        let constraints = manager.interference_constraints(&BTreeSet::from([s(1), s(3)]));
        assert_eq!(constraints.len(), 4);
        assert!(constraints.iter().all(|c| c.target == s(3)));
    }

    #[test]
    fn relevant_constraints_respect_domains() {
        let manager =
            ChannelSpecificConstraintManager::from_csv("CO,1,4,1,2\n".as_bytes(), &stations())
                .unwrap();

        let mut domains = BTreeMap::new();
        let _ = domains.insert(s(1), BTreeSet::from([1, 2]));
        let _ = domains.insert(s(2), BTreeSet::from([2, 3]));

        assert_eq!(
            manager.relevant_constraints(&domains),
            vec![Constraint::new(s(1), 2, s(2), 2)]
        );
        assert!(!manager.is_satisfying_assignment(&BTreeMap::from([(s(1), 2), (s(2), 2)])));
        assert!(manager.is_satisfying_assignment(&BTreeMap::from([(s(1), 1), (s(2), 2)])));
    }

    #[test]
    fn malformed_lines_are_reported() {
        assert!(matches!(
            ChannelSpecificConstraintManager::from_csv("ADJ-1,1,1,1,2\n".as_bytes(), &stations()),
            Err(DataError::UnsupportedConstraintKey { line: 1, .. })
        ));
        assert!(matches!(
            ChannelSpecificConstraintManager::from_csv("CO,3,1,1,2\n".as_bytes(), &stations()),
            Err(DataError::InvalidChannelRange { low: 3, high: 1, .. })
        ));
        assert!(matches!(
            ChannelSpecificConstraintManager::from_csv("CO,1,1,1,9\n".as_bytes(), &stations()),
            Err(DataError::UnknownStation(9))
        ));
        assert!(matches!(
            ChannelSpecificConstraintManager::from_csv("CO,1,1\n".as_bytes(), &stations()),
            Err(DataError::Malformed { line: 1, .. })
        ));
    }
}
