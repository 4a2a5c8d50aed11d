use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::hash::Hasher;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;

use fnv::FnvHasher;
use log::debug;

use super::csv_cells;
use super::parse_cell;
use super::DataError;
use super::StationManager;
use crate::basic_types::Channel;
use crate::basic_types::Station;

/// A [`StationManager`] holding every station with its global domain.
///
/// The CSV form has one station per line: `label,stationId,channel,channel,...`. The label is
/// ignored and blank channel cells are skipped.
#[derive(Clone, Debug)]
pub struct DomainStationManager {
    domains: BTreeMap<Station, BTreeSet<Channel>>,
    fingerprint: String,
}

impl DomainStationManager {
    pub fn new(
        domains: BTreeMap<Station, BTreeSet<Channel>>,
    ) -> Result<DomainStationManager, DataError> {
        if let Some((station, _)) = domains.iter().find(|(_, domain)| domain.is_empty()) {
            return Err(DataError::EmptyDomain(station.id()));
        }

        let fingerprint = compute_fingerprint(&domains);
        Ok(DomainStationManager {
            domains,
            fingerprint,
        })
    }

    pub fn from_csv(source: impl Read) -> Result<DomainStationManager, DataError> {
        let mut domains = BTreeMap::new();

        for (index, line) in BufReader::new(source).lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            let cells = csv_cells(&line);
            if cells.is_empty() {
                continue;
            }

            let id_cell = cells.get(1).ok_or_else(|| DataError::Malformed {
                line: line_number,
                message: "expected a label followed by a station id".to_owned(),
            })?;
            let id = parse_cell::<u32>(id_cell, line_number, "station id")?;

            let domain = cells[2..]
                .iter()
                .filter(|cell| !cell.is_empty())
                .map(|cell| parse_cell::<Channel>(cell, line_number, "channel"))
                .collect::<Result<BTreeSet<_>, _>>()?;

            if domains.insert(Station::new(id), domain).is_some() {
                return Err(DataError::DuplicateStation(id));
            }
        }

        debug!("Read the domains of {} stations", domains.len());
        DomainStationManager::new(domains)
    }
}

impl StationManager for DomainStationManager {
    fn stations(&self) -> BTreeSet<Station> {
        self.domains.keys().copied().collect()
    }

    fn domain(&self, station: Station) -> Result<&BTreeSet<Channel>, DataError> {
        self.domains
            .get(&station)
            .ok_or(DataError::UnknownStation(station.id()))
    }

    fn station_by_id(&self, id: u32) -> Result<Station, DataError> {
        let station = Station::new(id);
        if self.domains.contains_key(&station) {
            Ok(station)
        } else {
            Err(DataError::UnknownStation(id))
        }
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }
}

fn compute_fingerprint(domains: &BTreeMap<Station, BTreeSet<Channel>>) -> String {
    let mut hasher = FnvHasher::default();
    for (station, domain) in domains.iter() {
        hasher.write_u32(station.id());
        for &channel in domain.iter() {
            hasher.write_u32(channel);
        }
        hasher.write_u8(0xff);
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::DomainStationManager;
    use crate::basic_types::Station;
    use crate::data::DataError;
    use crate::data::StationManager;

    const DOMAINS: &str = "\
DOMAIN,1,14,15,16
DOMAIN,2,14, ,15,

DOMAIN,3,20
";

    #[test]
    fn reads_domains_from_csv() {
        let manager = DomainStationManager::from_csv(DOMAINS.as_bytes()).unwrap();

        assert_eq!(manager.stations().len(), 3);
        assert_eq!(
            manager.domain(Station::new(2)).unwrap(),
            &BTreeSet::from([14, 15])
        );
        assert_eq!(manager.station_by_id(3).unwrap(), Station::new(3));
        assert!(matches!(
            manager.station_by_id(4),
            Err(DataError::UnknownStation(4))
        ));
    }

    #[test]
    fn empty_domains_and_duplicates_are_errors() {
        assert!(matches!(
            DomainStationManager::from_csv("DOMAIN,1,\n".as_bytes()),
            Err(DataError::EmptyDomain(1))
        ));
        assert!(matches!(
            DomainStationManager::from_csv("DOMAIN,1,2\nDOMAIN,1,3\n".as_bytes()),
            Err(DataError::DuplicateStation(1))
        ));
        assert!(matches!(
            DomainStationManager::from_csv("DOMAIN,x,2\n".as_bytes()),
            Err(DataError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn fingerprint_depends_on_content_only() {
        let first = DomainStationManager::from_csv(DOMAINS.as_bytes()).unwrap();
        let second = DomainStationManager::from_csv(DOMAINS.as_bytes()).unwrap();
        let other = DomainStationManager::from_csv("DOMAIN,1,14\n".as_bytes()).unwrap();

        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_ne!(first.fingerprint(), other.fingerprint());
    }
}
