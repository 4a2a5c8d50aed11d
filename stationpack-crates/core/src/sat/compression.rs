use std::collections::BTreeMap;
use std::num::NonZeroU64;

use super::Clause;
use super::Cnf;
use super::DecodeError;
use super::Literal;

/// Renames the variables of a formula to the dense range `1..=n`, in increasing order of the
/// original variables.
#[derive(Clone, Copy, Debug, Default)]
pub struct VariableCompressor;

impl VariableCompressor {
    pub fn compress(&self, cnf: &Cnf) -> (Cnf, Compression) {
        let originals = cnf.variables().into_iter().collect::<Vec<_>>();
        let dense = originals
            .iter()
            .enumerate()
            .filter_map(|(index, &original)| {
                NonZeroU64::new(index as u64 + 1).map(|compressed| (original, compressed))
            })
            .collect::<BTreeMap<_, _>>();

        let rename = |literal: &Literal| {
            dense
                .get(&literal.variable())
                .map(|&variable| Literal::new(variable, literal.is_positive()))
        };

        let mut compressed = cnf
            .clauses()
            .iter()
            .map(|clause| Clause::new(clause.literals().iter().filter_map(rename)))
            .collect::<Cnf>();

        compressed.set_phase_hints(cnf.phase_hints().iter().filter_map(rename).collect());

        (compressed, Compression { originals })
    }
}

/// The inverse of one [`VariableCompressor::compress`] call. It belongs to a single formula and is
/// dropped with it.
#[derive(Clone, Debug)]
pub struct Compression {
    /// The original of compressed variable `i + 1` is at index `i`.
    originals: Vec<NonZeroU64>,
}

impl Compression {
    pub fn num_variables(&self) -> usize {
        self.originals.len()
    }

    /// Maps a model over the compressed variables back to the original variables.
    pub fn decompress(&self, model: &[Literal]) -> Result<Vec<Literal>, DecodeError> {
        model
            .iter()
            .map(|literal| {
                let index = usize::try_from(literal.variable().get() - 1)
                    .map_err(|_| DecodeError::UnknownVariable(literal.variable().get()))?;

                self.originals
                    .get(index)
                    .map(|&original| Literal::new(original, literal.is_positive()))
                    .ok_or(DecodeError::UnknownVariable(literal.variable().get()))
            })
            .collect()
    }
}
