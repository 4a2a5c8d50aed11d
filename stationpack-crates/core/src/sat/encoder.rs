use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::num::NonZeroU64;

use itertools::Itertools;
use log::debug;
use thiserror::Error;

use super::Clause;
use super::Cnf;
use super::Literal;
use crate::basic_types::Assignment;
use crate::basic_types::Channel;
use crate::basic_types::Station;
use crate::basic_types::StationPackingInstance;
use crate::data::ConstraintManager;

/// Failure to turn a model reported by a backend into a witness assignment.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("variable {0} does not belong to the encoding")]
    UnknownVariable(u64),
    #[error("variable {0} is assigned both true and false")]
    ContradictoryLiterals(u64),
    #[error("no channel is selected for station {0}")]
    NoChannel(Station),
    #[error("station {station} is assigned to channels {first} and {second}")]
    MultipleChannels {
        station: Station,
        first: Channel,
        second: Channel,
    },
    #[error("channel {channel} of station {station} is outside its domain")]
    ChannelOutsideDomain { station: Station, channel: Channel },
}

/// The variable of the pair (`station`, `channel`): the Szudzik pairing of station id and channel,
/// shifted by one so that it is strictly positive.
pub fn pair_variable(station: Station, channel: Channel) -> NonZeroU64 {
    let x = u64::from(station.id());
    let y = u64::from(channel);

    let paired = if x < y { y * y + x } else { x * x + x + y };

    NonZeroU64::MIN.saturating_add(paired)
}

/// The inverse of [`pair_variable`]. Returns `None` for variables that no pair maps to.
pub fn unpair_variable(variable: NonZeroU64) -> Option<(Station, Channel)> {
    let z = variable.get() - 1;
    let root = z.isqrt();
    let rest = z - root * root;

    let (x, y) = if rest < root {
        (rest, root)
    } else {
        (root, rest - root)
    };

    let station = u32::try_from(x).ok()?;
    let channel = Channel::try_from(y).ok()?;

    Some((Station::new(station), channel))
}

/// Builds the CNF form of a [`StationPackingInstance`].
///
/// There is one variable per (station, channel) pair of the current domains. Each station gets a
/// coverage clause and pairwise at-most-one clauses, and every interference constraint whose
/// endpoints both have a variable becomes a binary clause forbidding the pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct SatEncoder;

impl SatEncoder {
    pub fn encode(
        &self,
        instance: &StationPackingInstance,
        constraints: &dyn ConstraintManager,
    ) -> Encoding {
        let mut cnf = Cnf::new();
        let mut variables = BTreeMap::new();

        for (&station, domain) in instance.domains().iter() {
            for &channel in domain.iter() {
                let _ = variables.insert(pair_variable(station, channel), (station, channel));
            }

            cnf.add_clause(Clause::new(
                domain
                    .iter()
                    .map(|&channel| Literal::positive(pair_variable(station, channel))),
            ));

            for (&first, &second) in domain.iter().tuple_combinations() {
                cnf.add_clause(Clause::new([
                    Literal::negative(pair_variable(station, first)),
                    Literal::negative(pair_variable(station, second)),
                ]));
            }
        }

        let mut num_interference_clauses = 0;
        for constraint in constraints.relevant_constraints(instance.domains()) {
            cnf.add_clause(Clause::new([
                Literal::negative(pair_variable(constraint.source, constraint.source_channel)),
                Literal::negative(pair_variable(constraint.target, constraint.target_channel)),
            ]));
            num_interference_clauses += 1;
        }

        cnf.set_phase_hints(
            instance
                .previous_assignment()
                .iter()
                .map(|(&station, &channel)| Literal::positive(pair_variable(station, channel)))
                .collect(),
        );

        debug!(
            "Encoded {} with {} variables and {} clauses ({} from interference)",
            instance.name(),
            variables.len(),
            cnf.num_clauses(),
            num_interference_clauses
        );

        Encoding { cnf, variables }
    }
}

/// The result of encoding one instance: the formula and the inverse of its variable mapping.
/// Only meaningful together with the instance it was built from.
#[derive(Clone, Debug)]
pub struct Encoding {
    cnf: Cnf,
    variables: BTreeMap<NonZeroU64, (Station, Channel)>,
}

impl Encoding {
    pub fn cnf(&self) -> &Cnf {
        &self.cnf
    }

    pub fn into_cnf(self) -> Cnf {
        self.cnf
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// The (station, channel) pair behind `variable`, if it belongs to this encoding.
    pub fn pair(&self, variable: NonZeroU64) -> Option<(Station, Channel)> {
        self.variables.get(&variable).copied()
    }

    /// Turns a satisfying model into a witness assignment for `instance`.
    ///
    /// Variables missing from the model are false. The result places every station of the
    /// instance on exactly one channel of its domain; anything else is reported as an error.
    pub fn decode(
        &self,
        instance: &StationPackingInstance,
        model: &[Literal],
    ) -> Result<Assignment, DecodeError> {
        let mut values = BTreeMap::new();
        for literal in model.iter() {
            let previous = values.insert(literal.variable(), literal.is_positive());
            if previous.is_some_and(|value| value != literal.is_positive()) {
                return Err(DecodeError::ContradictoryLiterals(literal.variable().get()));
            }
        }

        let mut chosen: BTreeMap<Station, Channel> = BTreeMap::new();
        for (&variable, _) in values.iter().filter(|(_, &value)| value) {
            let (station, channel) = self
                .variables
                .get(&variable)
                .copied()
                .ok_or(DecodeError::UnknownVariable(variable.get()))?;

            if let Some(first) = chosen.insert(station, channel) {
                return Err(DecodeError::MultipleChannels {
                    station,
                    first: first.min(channel),
                    second: first.max(channel),
                });
            }
        }

        let mut assignment = Assignment::new();
        for (station, domain) in instance.domains().iter() {
            let channel = chosen
                .remove(station)
                .ok_or(DecodeError::NoChannel(*station))?;

            if !domain.contains(&channel) {
                return Err(DecodeError::ChannelOutsideDomain {
                    station: *station,
                    channel,
                });
            }

            assignment.assign(*station, channel);
        }

        if let Some((&station, &channel)) = chosen.iter().next() {
            return Err(DecodeError::ChannelOutsideDomain { station, channel });
        }

        Ok(assignment)
    }

    /// The model selecting exactly the pairs of `assignment`: their variables true, every other
    /// variable of the encoding false.
    pub fn model_of(&self, assignment: &Assignment) -> Vec<Literal> {
        let selected = assignment
            .iter()
            .map(|(station, channel)| pair_variable(station, channel))
            .collect::<BTreeSet<_>>();

        self.variables
            .keys()
            .map(|&variable| Literal::new(variable, selected.contains(&variable)))
            .collect()
    }
}
