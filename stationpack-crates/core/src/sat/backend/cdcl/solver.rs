use std::num::NonZeroU64;
use std::ops::Not;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::trace;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use super::CdclOptions;
use crate::basic_types::sequence_generators::LubySequence;
use crate::basic_types::sequence_generators::SequenceGenerator;
use crate::basic_types::HashMap;
use crate::basic_types::SatResult;
use crate::containers::ActivityHeap;
use crate::containers::KeyedVec;
use crate::containers::StorageKey;
use crate::sat::backend::IncrementalSatLibrary;
use crate::sat::Literal;
use crate::stationpack_assert_moderate;
use crate::stationpack_assert_simple;
use crate::termination::TerminationCriterion;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Var(u32);

impl StorageKey for Var {
    fn index(&self) -> usize {
        self.0 as usize
    }

    fn create_from_index(index: usize) -> Self {
        Var(index as u32)
    }
}

/// A literal over the internal variables, `2 * var` for the positive and `2 * var + 1` for the
/// negative literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Lit(u32);

impl Lit {
    fn new(var: Var, is_positive: bool) -> Lit {
        Lit(var.0 * 2 + u32::from(!is_positive))
    }

    fn var(self) -> Var {
        Var(self.0 / 2)
    }

    fn is_positive(self) -> bool {
        self.0 % 2 == 0
    }
}

impl Not for Lit {
    type Output = Lit;

    fn not(self) -> Self::Output {
        Lit(self.0 ^ 1)
    }
}

impl StorageKey for Lit {
    fn index(&self) -> usize {
        self.0 as usize
    }

    fn create_from_index(index: usize) -> Self {
        Lit(index as u32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ClauseRef(u32);

impl StorageKey for ClauseRef {
    fn index(&self) -> usize {
        self.0 as usize
    }

    fn create_from_index(index: usize) -> Self {
        ClauseRef(index as u32)
    }
}

fn lit_value(assignments: &KeyedVec<Var, Option<bool>>, lit: Lit) -> Option<bool> {
    assignments[lit.var()].map(|value| value == lit.is_positive())
}

/// What to do with a watcher after the literal it watches became false.
enum Watch {
    Keep,
    Moved,
    Unit(Lit),
    Conflict,
}

/// An incremental conflict-driven clause learning SAT solver.
///
/// Propagation uses two watched literals per clause; the first literal of a reason clause is the
/// literal it propagated. Conflicts are analysed to the first unique implication point, branching
/// follows VSIDS activities with phase saving, and restarts follow a Luby sequence. Assumptions
/// are placed as the first decisions of every search.
///
/// Clauses are kept across solve calls; learned clauses are implied by the input, so they stay
/// valid when more clauses are added.
#[derive(Debug)]
pub struct CdclSolver {
    options: CdclOptions,
    rng: SmallRng,
    interrupt: Arc<AtomicBool>,

    external_to_var: HashMap<NonZeroU64, Var>,
    var_to_external: KeyedVec<Var, NonZeroU64>,

    clauses: KeyedVec<ClauseRef, Vec<Lit>>,
    /// `watches[lit]` holds the clauses which have `lit` as one of their first two literals.
    watches: KeyedVec<Lit, Vec<ClauseRef>>,

    assignments: KeyedVec<Var, Option<bool>>,
    levels: KeyedVec<Var, usize>,
    reasons: KeyedVec<Var, Option<ClauseRef>>,
    phases: KeyedVec<Var, bool>,
    seen: KeyedVec<Var, bool>,
    heap: ActivityHeap<Var>,

    trail: Vec<Lit>,
    /// `trail_delimiters[i]` is the trail length when decision level `i + 1` started.
    trail_delimiters: Vec<usize>,
    propagation_head: usize,

    /// Set once the clauses are unsatisfiable without any assumption.
    unsat_at_root: bool,
    model: KeyedVec<Var, bool>,

    num_conflicts: u64,
    num_decisions: u64,
}

impl CdclSolver {
    /// Creates an empty solver. Raising `interrupt` makes a running solve call return
    /// [`SatResult::Killed`].
    pub fn new(options: CdclOptions, seed: u64, interrupt: Arc<AtomicBool>) -> CdclSolver {
        CdclSolver {
            options,
            rng: SmallRng::seed_from_u64(seed),
            interrupt,
            external_to_var: HashMap::default(),
            var_to_external: KeyedVec::default(),
            clauses: KeyedVec::default(),
            watches: KeyedVec::default(),
            assignments: KeyedVec::default(),
            levels: KeyedVec::default(),
            reasons: KeyedVec::default(),
            phases: KeyedVec::default(),
            seen: KeyedVec::default(),
            heap: ActivityHeap::new(options.activity_decay),
            trail: Vec::new(),
            trail_delimiters: Vec::new(),
            propagation_head: 0,
            unsat_at_root: false,
            model: KeyedVec::default(),
            num_conflicts: 0,
            num_decisions: 0,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.var_to_external.len()
    }

    pub fn num_conflicts(&self) -> u64 {
        self.num_conflicts
    }

    pub fn num_decisions(&self) -> u64 {
        self.num_decisions
    }

    fn variable(&mut self, external: NonZeroU64) -> Option<Var> {
        if let Some(&var) = self.external_to_var.get(&external) {
            return Some(var);
        }

        if self.var_to_external.len() >= (u32::MAX / 2) as usize {
            return None;
        }

        let var = self.var_to_external.push(external);
        let _ = self.external_to_var.insert(external, var);

        let _ = self.assignments.push(None);
        let _ = self.levels.push(0);
        let _ = self.reasons.push(None);
        let _ = self.phases.push(false);
        let _ = self.seen.push(false);
        let _ = self.watches.push(Vec::new());
        let _ = self.watches.push(Vec::new());

        // A small random initial activity breaks ties differently per seed.
        let activity = self.rng.gen_range(0.0..1e-5);
        self.heap.grow(var, activity);

        Some(var)
    }

    fn decision_level(&self) -> usize {
        self.trail_delimiters.len()
    }

    fn new_decision_level(&mut self) {
        self.trail_delimiters.push(self.trail.len());
    }

    fn assign(&mut self, lit: Lit, reason: Option<ClauseRef>) {
        stationpack_assert_simple!(self.assignments[lit.var()].is_none());

        self.assignments[lit.var()] = Some(lit.is_positive());
        self.levels[lit.var()] = self.decision_level();
        self.reasons[lit.var()] = reason;
        self.trail.push(lit);
    }

    fn backtrack(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }

        let new_length = self.trail_delimiters[level];
        for index in (new_length..self.trail.len()).rev() {
            let lit = self.trail[index];
            let var = lit.var();

            self.phases[var] = lit.is_positive();
            self.assignments[var] = None;
            self.reasons[var] = None;
            self.heap.restore(var);
        }

        self.trail.truncate(new_length);
        self.trail_delimiters.truncate(level);
        self.propagation_head = self.trail.len();
    }

    fn attach(&mut self, literals: Vec<Lit>) -> ClauseRef {
        stationpack_assert_moderate!(literals.len() >= 2);

        let clause_ref = self.clauses.push(literals);
        let first = self.clauses[clause_ref][0];
        let second = self.clauses[clause_ref][1];
        self.watches[first].push(clause_ref);
        self.watches[second].push(clause_ref);
        clause_ref
    }

    /// Propagates the trail until fixpoint. Returns the falsified clause on a conflict.
    fn propagate(&mut self) -> Option<ClauseRef> {
        while self.propagation_head < self.trail.len() {
            let false_lit = !self.trail[self.propagation_head];
            self.propagation_head += 1;

            let mut watchers = std::mem::take(&mut self.watches[false_lit]);
            let mut conflict = None;
            let mut index = 0;

            while index < watchers.len() {
                let clause_ref = watchers[index];

                let action = {
                    let clause = &mut self.clauses[clause_ref];
                    if clause[0] == false_lit {
                        clause.swap(0, 1);
                    }

                    if lit_value(&self.assignments, clause[0]) == Some(true) {
                        Watch::Keep
                    } else if let Some(position) = (2..clause.len())
                        .find(|&k| lit_value(&self.assignments, clause[k]) != Some(false))
                    {
                        clause.swap(1, position);
                        self.watches[clause[1]].push(clause_ref);
                        Watch::Moved
                    } else if lit_value(&self.assignments, clause[0]) == Some(false) {
                        Watch::Conflict
                    } else {
                        Watch::Unit(clause[0])
                    }
                };

                match action {
                    Watch::Keep => index += 1,
                    Watch::Moved => {
                        let _ = watchers.swap_remove(index);
                    }
                    Watch::Unit(lit) => {
                        self.assign(lit, Some(clause_ref));
                        index += 1;
                    }
                    Watch::Conflict => {
                        conflict = Some(clause_ref);
                        break;
                    }
                }
            }

            watchers.append(&mut self.watches[false_lit]);
            self.watches[false_lit] = watchers;

            if conflict.is_some() {
                self.propagation_head = self.trail.len();
                return conflict;
            }
        }

        None
    }

    /// Derives the first-UIP clause of `conflict`. Its first literal is the one asserted after
    /// backjumping; the second literal, if any, has the highest level among the rest. Returns the
    /// clause and the backjump level.
    fn analyse(&mut self, conflict: ClauseRef) -> (Vec<Lit>, usize) {
        let current_level = self.decision_level();
        let mut learned = vec![Lit(0)];
        let mut num_open = 0usize;
        let mut clause_ref = conflict;
        let mut skip_first = false;
        let mut index = self.trail.len();

        loop {
            let start = usize::from(skip_first);
            for k in start..self.clauses[clause_ref].len() {
                let lit = self.clauses[clause_ref][k];
                let var = lit.var();

                if self.seen[var] || self.levels[var] == 0 {
                    continue;
                }

                self.seen[var] = true;
                self.heap.bump(var);

                if self.levels[var] >= current_level {
                    num_open += 1;
                } else {
                    learned.push(lit);
                }
            }

            loop {
                index -= 1;
                if self.seen[self.trail[index].var()] {
                    break;
                }
            }

            let lit = self.trail[index];
            self.seen[lit.var()] = false;
            num_open -= 1;

            if num_open == 0 {
                learned[0] = !lit;
                break;
            }

            match self.reasons[lit.var()] {
                Some(reason) => {
                    clause_ref = reason;
                    skip_first = true;
                }
                None => {
                    learned[0] = !lit;
                    break;
                }
            }
        }

        for &lit in learned[1..].iter() {
            self.seen[lit.var()] = false;
        }

        if learned.len() == 1 {
            return (learned, 0);
        }

        let mut highest = 1;
        for position in 2..learned.len() {
            if self.levels[learned[position].var()] > self.levels[learned[highest].var()] {
                highest = position;
            }
        }
        learned.swap(1, highest);

        let level = self.levels[learned[1].var()];
        (learned, level)
    }

    fn pick_branching_literal(&mut self) -> Option<Lit> {
        while let Some(var) = self.heap.pop_max() {
            if self.assignments[var].is_none() {
                return Some(Lit::new(var, self.phases[var]));
            }
        }

        None
    }

    fn should_stop(&self, termination: &dyn TerminationCriterion) -> Option<SatResult> {
        if self.interrupt.load(Ordering::Relaxed) {
            Some(SatResult::Killed)
        } else if termination.has_expired() {
            Some(SatResult::Timeout)
        } else {
            None
        }
    }

    fn internal_literal(&mut self, external: NonZeroU64, is_positive: bool) -> Option<Lit> {
        self.variable(external).map(|var| Lit::new(var, is_positive))
    }

    fn search(&mut self, assumptions: &[Lit], termination: &dyn TerminationCriterion) -> SatResult {
        let mut restarts = LubySequence::new(self.options.restart_base);
        let mut conflicts_until_restart = restarts.next();

        loop {
            if let Some(conflict) = self.propagate() {
                self.num_conflicts += 1;
                conflicts_until_restart = conflicts_until_restart.saturating_sub(1);

                if self.decision_level() == 0 {
                    self.unsat_at_root = true;
                    return SatResult::Unsat;
                }

                let (learned, level) = self.analyse(conflict);
                self.backtrack(level);

                if learned.len() == 1 {
                    self.assign(learned[0], None);
                } else {
                    let asserting = learned[0];
                    let clause_ref = self.attach(learned);
                    self.assign(asserting, Some(clause_ref));
                }

                self.heap.decay();

                if self.num_conflicts % self.options.conflict_polling_interval == 0 {
                    if let Some(result) = self.should_stop(termination) {
                        return result;
                    }
                }

                continue;
            }

            if conflicts_until_restart == 0 {
                trace!("Restarting after {} conflicts", self.num_conflicts);
                self.backtrack(0);
                conflicts_until_restart = restarts.next();
            }

            let level = self.decision_level();
            if level < assumptions.len() {
                let assumption = assumptions[level];
                match lit_value(&self.assignments, assumption) {
                    Some(true) => self.new_decision_level(),
                    Some(false) => return SatResult::Unsat,
                    None => {
                        self.new_decision_level();
                        self.assign(assumption, None);
                    }
                }
                continue;
            }

            let Some(decision) = self.pick_branching_literal() else {
                return SatResult::Sat;
            };

            self.num_decisions += 1;
            if self.num_decisions % self.options.decision_polling_interval == 0 {
                if let Some(result) = self.should_stop(termination) {
                    return result;
                }
            }

            self.new_decision_level();
            self.assign(decision, None);
        }
    }
}

impl IncrementalSatLibrary for CdclSolver {
    fn add_clause(&mut self, positive: &[NonZeroU64], negative: &[NonZeroU64]) -> bool {
        self.backtrack(0);

        let mut literals = Vec::with_capacity(positive.len() + negative.len());
        for (&external, is_positive) in positive
            .iter()
            .map(|v| (v, true))
            .chain(negative.iter().map(|v| (v, false)))
        {
            let Some(lit) = self.internal_literal(external, is_positive) else {
                return false;
            };
            literals.push(lit);
        }

        if self.unsat_at_root {
            return true;
        }

        literals.sort();
        literals.dedup();

        let mut kept = Vec::with_capacity(literals.len());
        for (position, &lit) in literals.iter().enumerate() {
            if position > 0 && literals[position - 1] == !lit {
                return true;
            }

            match lit_value(&self.assignments, lit) {
                Some(true) => return true,
                Some(false) => {}
                None => kept.push(lit),
            }
        }

        match kept.len() {
            0 => self.unsat_at_root = true,
            1 => {
                self.assign(kept[0], None);
                if self.propagate().is_some() {
                    self.unsat_at_root = true;
                }
            }
            _ => {
                let _ = self.attach(kept);
            }
        }

        true
    }

    fn solve_with_assumptions(
        &mut self,
        assumed_true: &[NonZeroU64],
        assumed_false: &[NonZeroU64],
        termination: &dyn TerminationCriterion,
    ) -> SatResult {
        self.backtrack(0);

        if let Some(result) = self.should_stop(termination) {
            return result;
        }

        if self.unsat_at_root {
            return SatResult::Unsat;
        }

        let mut assumptions = Vec::with_capacity(assumed_true.len() + assumed_false.len());
        for (&external, is_positive) in assumed_true
            .iter()
            .map(|v| (v, true))
            .chain(assumed_false.iter().map(|v| (v, false)))
        {
            let Some(lit) = self.internal_literal(external, is_positive) else {
                return SatResult::Crashed;
            };
            assumptions.push(lit);
        }

        let result = self.search(&assumptions, termination);

        if result == SatResult::Sat {
            self.model = KeyedVec::filled(self.num_variables(), false);
            for var in self.assignments.keys().collect::<Vec<_>>() {
                self.model[var] = self.assignments[var].unwrap_or(false);
            }
        }

        trace!(
            "Search finished with {result} after {} conflicts and {} decisions",
            self.num_conflicts,
            self.num_decisions
        );

        self.backtrack(0);
        result
    }

    fn value(&self, variable: NonZeroU64) -> Option<bool> {
        self.external_to_var
            .get(&variable)
            .and_then(|&var| self.model.get(var).copied())
    }

    fn set_phase(&mut self, literal: Literal) {
        if let Some(var) = self.variable(literal.variable()) {
            self.phases[var] = literal.is_positive();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroI64;

    use itertools::Itertools;
    use rand::seq::SliceRandom;

    use super::*;
    use crate::sat::Clause;
    use crate::sat::Cnf;
    use crate::termination::Indefinite;
    use crate::termination::TimeBudget;

    fn var(v: u64) -> NonZeroU64 {
        NonZeroU64::new(v).unwrap()
    }

    fn solver() -> CdclSolver {
        CdclSolver::new(CdclOptions::default(), 42, Arc::new(AtomicBool::new(false)))
    }

    fn add(solver: &mut CdclSolver, clause: &[i64]) {
        let positive = clause
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| var(c as u64))
            .collect::<Vec<_>>();
        let negative = clause
            .iter()
            .filter(|&&c| c < 0)
            .map(|&c| var(c.unsigned_abs()))
            .collect::<Vec<_>>();
        assert!(solver.add_clause(&positive, &negative));
    }

    fn model_satisfies(solver: &CdclSolver, clauses: &[Vec<i64>]) -> bool {
        clauses.iter().all(|clause| {
            clause.iter().any(|&c| {
                let value = solver.value(var(c.unsigned_abs())).unwrap_or(false);
                value == (c > 0)
            })
        })
    }

    /// `pigeons` pigeons in `holes` holes, each pigeon in a hole and no hole shared.
    fn pigeonhole(pigeons: u64, holes: u64) -> Vec<Vec<i64>> {
        let x = |p: u64, h: u64| (p * holes + h + 1) as i64;
        let mut clauses = Vec::new();
        for p in 0..pigeons {
            clauses.push((0..holes).map(|h| x(p, h)).collect());
        }
        for h in 0..holes {
            for (p, q) in (0..pigeons).tuple_combinations() {
                clauses.push(vec![-x(p, h), -x(q, h)]);
            }
        }
        clauses
    }

    #[test]
    fn simple_satisfiable_formula() {
        let clauses = vec![vec![1, 2], vec![-1, 3], vec![-3, -2], vec![2, 3]];
        let mut solver = solver();
        for clause in clauses.iter() {
            add(&mut solver, clause);
        }

        assert_eq!(solver.solve(&Indefinite), SatResult::Sat);
        assert!(model_satisfies(&solver, &clauses));
    }

    #[test]
    fn pigeonhole_is_unsatisfiable() {
        let mut solver = solver();
        for clause in pigeonhole(5, 4).iter() {
            add(&mut solver, clause);
        }

        assert_eq!(solver.solve(&Indefinite), SatResult::Unsat);
        assert!(solver.num_conflicts() > 0);
    }

    #[test]
    fn pigeonhole_with_enough_holes_is_satisfiable() {
        let clauses = pigeonhole(6, 6);
        let mut solver = solver();
        for clause in clauses.iter() {
            add(&mut solver, clause);
        }

        assert_eq!(solver.solve(&Indefinite), SatResult::Sat);
        assert!(model_satisfies(&solver, &clauses));
    }

    #[test]
    fn random_formulas_agree_with_their_models() {
        let mut rng = SmallRng::seed_from_u64(7);
        let num_variables = 12u64;

        for round in 0..40 {
            let mut clauses = Vec::new();
            for _ in 0..52 {
                let mut variables = (1..=num_variables).collect::<Vec<_>>();
                variables.shuffle(&mut rng);
                clauses.push(
                    variables[..3]
                        .iter()
                        .map(|&v| if rng.gen_bool(0.5) { v as i64 } else { -(v as i64) })
                        .collect::<Vec<_>>(),
                );
            }

            let mut solver = CdclSolver::new(
                CdclOptions::default(),
                round,
                Arc::new(AtomicBool::new(false)),
            );
            for clause in clauses.iter() {
                add(&mut solver, clause);
            }

            if solver.solve(&Indefinite) == SatResult::Sat {
                assert!(model_satisfies(&solver, &clauses));
            } else {
                let cnf: Cnf = clauses
                    .iter()
                    .map(|clause| {
                        Clause::new(clause.iter().map(|&c| {
                            Literal::from_dimacs(NonZeroI64::new(c).unwrap())
                        }))
                    })
                    .collect();
                assert_eq!(brute_force(&cnf, num_variables), None);
            }
        }
    }

    fn brute_force(cnf: &Cnf, num_variables: u64) -> Option<u64> {
        (0..1u64 << num_variables).find(|bits| {
            let model = (1..=num_variables)
                .map(|v| Literal::new(var(v), bits & (1 << (v - 1)) != 0))
                .collect::<Vec<_>>();
            cnf.is_satisfied_by(&model)
        })
    }

    #[test]
    fn assumptions_do_not_stick() {
        let mut solver = solver();
        add(&mut solver, &[1, 2]);
        add(&mut solver, &[-1, 2]);

        assert_eq!(
            solver.solve_with_assumptions(&[], &[var(2)], &Indefinite),
            SatResult::Unsat
        );
        assert_eq!(solver.solve(&Indefinite), SatResult::Sat);
        assert_eq!(solver.value(var(2)), Some(true));

        assert_eq!(
            solver.solve_with_assumptions(&[var(1)], &[], &Indefinite),
            SatResult::Sat
        );
        assert_eq!(solver.value(var(1)), Some(true));
    }

    #[test]
    fn empty_clause_makes_the_formula_unsatisfiable() {
        let mut solver = solver();
        add(&mut solver, &[1]);
        add(&mut solver, &[-1]);
        assert_eq!(solver.solve(&Indefinite), SatResult::Unsat);
    }

    #[test]
    fn phases_guide_the_first_decisions() {
        let mut solver = solver();
        add(&mut solver, &[1, 2, 3]);
        solver.set_phase(Literal::positive(var(3)));
        solver.set_phase(Literal::negative(var(1)));

        assert_eq!(solver.solve(&Indefinite), SatResult::Sat);
        assert_eq!(solver.value(var(1)), Some(false));
        assert_eq!(solver.value(var(3)), Some(true));
    }

    #[test]
    fn stops_on_interrupt_or_expired_budget() {
        let interrupt = Arc::new(AtomicBool::new(true));
        let mut solver = CdclSolver::new(CdclOptions::default(), 1, Arc::clone(&interrupt));
        add(&mut solver, &[1, 2]);
        assert_eq!(solver.solve(&Indefinite), SatResult::Killed);

        interrupt.store(false, Ordering::Relaxed);
        let expired = TimeBudget::from_seconds(0.0);
        assert_eq!(solver.solve(&expired), SatResult::Timeout);
        assert_eq!(solver.solve(&Indefinite), SatResult::Sat);
    }
}
