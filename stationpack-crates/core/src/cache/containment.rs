use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::PoisonError;
use std::sync::RwLock;

use log::debug;
use log::warn;

use super::CacheContext;
use crate::basic_types::Assignment;
use crate::basic_types::Channel;
use crate::basic_types::Domains;
use crate::basic_types::HashMap;
use crate::basic_types::SatResult;
use crate::basic_types::SolverResult;
use crate::basic_types::Station;
use crate::basic_types::StationPackingInstance;
use crate::basic_types::Stopwatch;

/// A proof of feasibility: a witness for every station it mentions.
#[derive(Clone, Debug)]
struct SatEntry {
    witness: BTreeMap<Station, Channel>,
}

impl SatEntry {
    /// Whether the witness places every station of `domains` on a channel of its domain.
    fn covers(&self, domains: &Domains) -> bool {
        domains.iter().all(|(station, domain)| {
            self.witness
                .get(station)
                .is_some_and(|channel| domain.contains(channel))
        })
    }

    /// Whether every query this entry answers is also answered by `other`.
    fn is_implied_by(&self, other: &SatEntry) -> bool {
        self.witness
            .iter()
            .all(|(station, channel)| other.witness.get(station) == Some(channel))
    }
}

/// A proof of infeasibility of the stations of `domains` with (at most) those domains.
#[derive(Clone, Debug)]
struct UnsatEntry {
    domains: Domains,
}

impl UnsatEntry {
    /// Whether `domains` contains every station of the proof with a domain no larger than the
    /// proven one.
    fn covers(&self, domains: &Domains) -> bool {
        self.domains.iter().all(|(station, proven)| {
            domains
                .get(station)
                .is_some_and(|domain| domain.is_subset(proven))
        })
    }
}

#[derive(Debug, Default)]
struct Entries {
    sat: Vec<SatEntry>,
    unsat: Vec<UnsatEntry>,
}

/// Stores SAT and UNSAT proofs per [`CacheContext`] and answers queries by containment.
///
/// - A query is SAT when a SAT proof mentions every queried station and its witness channel lies
///   in the queried domain. The answer is the witness restricted to the queried stations.
/// - A query is UNSAT when an UNSAT proof only mentions queried stations, each with a queried
///   domain contained in the proven domain.
///
/// Only SAT and UNSAT results are stored. The cache is safe to share between threads; a query
/// never observes a partially applied insert.
#[derive(Debug, Default)]
pub struct ContainmentCache {
    entries: RwLock<HashMap<CacheContext, Entries>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContainmentCache {
    pub fn new() -> ContainmentCache {
        ContainmentCache::default()
    }

    pub fn query(
        &self,
        context: &CacheContext,
        instance: &StationPackingInstance,
    ) -> Option<SolverResult> {
        let stopwatch = Stopwatch::starting_now();
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        let answer = entries.get(context).and_then(|entries| {
            if let Some(entry) = entries
                .sat
                .iter()
                .find(|entry| entry.covers(instance.domains()))
            {
                let witness = instance
                    .stations()
                    .filter_map(|station| {
                        entry
                            .witness
                            .get(&station)
                            .map(|&channel| (station, channel))
                    })
                    .collect::<Assignment>();

                Some(SolverResult::sat(witness, stopwatch.elapsed_seconds()))
            } else if entries
                .unsat
                .iter()
                .any(|entry| entry.covers(instance.domains()))
            {
                Some(SolverResult::unsat(stopwatch.elapsed_seconds()))
            } else {
                None
            }
        });

        match &answer {
            Some(result) => {
                let _ = self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache hit for {} ({} stations): {}",
                    instance.name(),
                    instance.num_stations(),
                    result.result()
                );
            }
            None => {
                let _ = self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        answer
    }

    /// Stores the proof `result` for `instance`. Returns whether the cache changed: results other
    /// than SAT and UNSAT, and proofs implied by a stored one, are not stored.
    ///
    /// Stored proofs implied by the new one are dropped.
    pub fn insert(
        &self,
        context: &CacheContext,
        instance: &StationPackingInstance,
        result: &SolverResult,
    ) -> bool {
        match result.result() {
            SatResult::Sat => {
                if !result.assignment().is_valid_for(instance) {
                    warn!(
                        "Refusing to cache a witness which does not match {}",
                        instance.name()
                    );
                    return false;
                }

                let entry = SatEntry {
                    witness: result.assignment().station_channels(),
                };
                self.insert_sat(context, entry, instance)
            }
            SatResult::Unsat => {
                let entry = UnsatEntry {
                    domains: instance.domains().clone(),
                };
                self.insert_unsat(context, entry, instance)
            }
            SatResult::Timeout | SatResult::Crashed | SatResult::Killed => false,
        }
    }

    fn insert_sat(
        &self,
        context: &CacheContext,
        entry: SatEntry,
        instance: &StationPackingInstance,
    ) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entries = entries.entry(context.clone()).or_default();

        if entries.sat.iter().any(|stored| entry.is_implied_by(stored)) {
            return false;
        }

        let before = entries.sat.len();
        entries.sat.retain(|stored| !stored.is_implied_by(&entry));
        entries.sat.push(entry);

        debug!(
            "Cached SAT for {} ({} stations), superseding {} entries",
            instance.name(),
            instance.num_stations(),
            before + 1 - entries.sat.len()
        );
        true
    }

    fn insert_unsat(
        &self,
        context: &CacheContext,
        entry: UnsatEntry,
        instance: &StationPackingInstance,
    ) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entries = entries.entry(context.clone()).or_default();

        if entries.unsat.iter().any(|stored| stored.covers(&entry.domains)) {
            return false;
        }

        let before = entries.unsat.len();
        entries.unsat.retain(|stored| !entry.covers(&stored.domains));
        entries.unsat.push(entry);

        debug!(
            "Cached UNSAT for {} ({} stations), superseding {} entries",
            instance.name(),
            instance.num_stations(),
            before + 1 - entries.unsat.len()
        );
        true
    }

    pub fn num_sat(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|entries| entries.sat.len())
            .sum()
    }

    pub fn num_unsat(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|entries| entries.unsat.len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.num_sat() + self.num_unsat()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn num_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
