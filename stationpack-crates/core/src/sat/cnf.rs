use std::collections::BTreeSet;
use std::fmt::Display;
use std::fmt::Formatter;
use std::io::Write;
use std::num::NonZeroI64;
use std::num::NonZeroU64;

use itertools::Itertools;

/// A propositional literal: a strictly positive variable and a sign.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    variable: NonZeroU64,
    positive: bool,
}

impl Literal {
    pub const fn new(variable: NonZeroU64, positive: bool) -> Literal {
        Literal { variable, positive }
    }

    pub const fn positive(variable: NonZeroU64) -> Literal {
        Literal::new(variable, true)
    }

    pub const fn negative(variable: NonZeroU64) -> Literal {
        Literal::new(variable, false)
    }

    pub const fn variable(self) -> NonZeroU64 {
        self.variable
    }

    pub const fn is_positive(self) -> bool {
        self.positive
    }

    /// Reads a signed DIMACS code.
    pub fn from_dimacs(code: NonZeroI64) -> Literal {
        Literal::new(code.unsigned_abs(), code.get() > 0)
    }

    /// The signed DIMACS code of this literal.
    pub fn to_dimacs(self) -> i128 {
        let variable = i128::from(self.variable.get());
        if self.positive {
            variable
        } else {
            -variable
        }
    }
}

impl std::ops::Not for Literal {
    type Output = Literal;

    fn not(self) -> Self::Output {
        Literal::new(self.variable, !self.positive)
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// A disjunction of literals, kept sorted and without duplicates.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Clause {
    literals: Vec<Literal>,
}

impl Clause {
    pub fn new(literals: impl IntoIterator<Item = Literal>) -> Clause {
        let literals = literals
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Clause { literals }
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Whether the clause contains a literal together with its negation.
    pub fn is_tautology(&self) -> bool {
        self.literals
            .iter()
            .tuple_windows()
            .any(|(a, b)| a.variable() == b.variable())
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.literals.is_empty() {
            write!(f, "0")
        } else {
            write!(f, "{} 0", self.literals.iter().join(" "))
        }
    }
}

/// A conjunction of clauses, plus optional phase hints: literals a backend may prefer when it
/// first decides their variables. Hints never change satisfiability.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cnf {
    clauses: Vec<Clause>,
    phase_hints: Vec<Literal>,
}

impl Cnf {
    pub fn new() -> Cnf {
        Cnf::default()
    }

    pub fn add_clause(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The largest variable appearing in a clause, or 0 for an empty formula.
    pub fn max_variable(&self) -> u64 {
        self.clauses
            .iter()
            .flat_map(|clause| clause.literals())
            .map(|literal| literal.variable().get())
            .max()
            .unwrap_or(0)
    }

    /// Every variable appearing in a clause, in increasing order.
    pub fn variables(&self) -> BTreeSet<NonZeroU64> {
        self.clauses
            .iter()
            .flat_map(|clause| clause.literals())
            .map(|literal| literal.variable())
            .collect()
    }

    pub fn phase_hints(&self) -> &[Literal] {
        &self.phase_hints
    }

    pub fn set_phase_hints(&mut self, hints: Vec<Literal>) {
        self.phase_hints = hints;
    }

    /// Whether every clause has a literal made true by `model`. Variables missing from the
    /// model are false.
    pub fn is_satisfied_by(&self, model: &[Literal]) -> bool {
        let true_literals = model.iter().copied().collect::<BTreeSet<_>>();
        let assigned = model
            .iter()
            .map(|literal| literal.variable())
            .collect::<BTreeSet<_>>();

        self.clauses.iter().all(|clause| {
            clause.literals().iter().any(|literal| {
                true_literals.contains(literal)
                    || (!literal.is_positive() && !assigned.contains(&literal.variable()))
            })
        })
    }

    /// Writes the formula in DIMACS CNF form, `p cnf <variables> <clauses>` followed by one line
    /// per clause.
    pub fn write_dimacs(&self, mut sink: impl Write) -> std::io::Result<()> {
        writeln!(sink, "p cnf {} {}", self.max_variable(), self.clauses.len())?;
        for clause in self.clauses.iter() {
            writeln!(sink, "{clause}")?;
        }
        sink.flush()
    }

    pub fn to_dimacs(&self) -> String {
        let mut buffer = Vec::new();
        // Writing to a vector cannot fail.
        let _ = self.write_dimacs(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl FromIterator<Clause> for Cnf {
    fn from_iter<T: IntoIterator<Item = Clause>>(iter: T) -> Self {
        Cnf {
            clauses: iter.into_iter().collect(),
            phase_hints: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;

    fn lit(code: i64) -> Literal {
        Literal::from_dimacs(NonZeroI64::new(code).unwrap())
    }

    #[test]
    fn clauses_are_sorted_and_deduplicated() {
        let clause = Clause::new([lit(3), lit(-1), lit(3)]);
        assert_eq!(clause.literals(), &[lit(-1), lit(3)]);
        assert!(!clause.is_tautology());
        assert!(Clause::new([lit(2), lit(-2)]).is_tautology());
    }

    #[test]
    fn dimacs_text_has_header_and_terminated_clauses() {
        let cnf: Cnf = [Clause::new([lit(1), lit(2)]), Clause::new([lit(-1), lit(-2)])]
            .into_iter()
            .collect();

        assert_eq!(cnf.to_dimacs(), "p cnf 2 2\n1 2 0\n-1 -2 0\n");
        assert_eq!(cnf.max_variable(), 2);
    }

    #[test]
    fn satisfaction_treats_missing_variables_as_false() {
        let cnf: Cnf = [Clause::new([lit(1), lit(-2)])].into_iter().collect();
        assert!(cnf.is_satisfied_by(&[]));
        assert!(!cnf.is_satisfied_by(&[lit(-1), lit(2)]));
        assert!(cnf.is_satisfied_by(&[lit(1), lit(2)]));
    }

    #[test]
    fn negation_flips_the_sign_only() {
        let literal = Literal::positive(NonZeroU64::new(7).unwrap());
        assert_eq!((!literal).to_dimacs(), -7);
        assert_eq!(!!literal, literal);
    }
}
