//! The finite-domain search engine: propagation to fixpoint, depth-first
//! branch-and-bound, and cooperative budgets.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::solver::builder::Problem;
use crate::solver::domain::{bit_rank, rank_bit, DomainStore, Pruned, ABSENT_BIT};

/// Search counters, logged at debug level when a solve finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    pub decisions: u64,
    pub backtracks: u64,
    pub propagations: u64,
    pub solutions: u64,
}

/// Cooperative cancellation: an absolute deadline and/or a backtrack cap,
/// checked at every backtrack and propagation fixpoint boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct Budget {
    pub deadline: Option<Instant>,
    pub max_backtracks: Option<u64>,
}

impl Budget {
    pub fn new(timeout_ms: Option<u32>, max_backtracks: Option<u64>) -> Self {
        Self {
            deadline: timeout_ms.map(|ms| Instant::now() + Duration::from_millis(u64::from(ms))),
            max_backtracks,
        }
    }

    fn exhausted(&self, stats: &SolveStats) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        if let Some(max) = self.max_backtracks {
            if stats.backtracks > max {
                return true;
            }
        }
        false
    }
}

/// The budget ran out before the search proved a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetExhausted;

/// A complete assignment: the chosen version rank per variable, `None`
/// meaning ABSENT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub values: Vec<Option<usize>>,
}

/// Solver state layered over an immutable [`Problem`].
///
/// One instance can run many solves against varying restriction subsets
/// (the diagnoser does); domains, queue and trail are reused across runs.
pub struct Solver<'a> {
    problem: &'a Problem,
    store: DomainStore,
    queue: VecDeque<usize>,
    queued: Vec<bool>,
    stats: SolveStats,
}

impl<'a> Solver<'a> {
    pub fn new(problem: &'a Problem) -> Self {
        Self {
            problem,
            store: DomainStore::new(&problem.base),
            queue: VecDeque::new(),
            queued: vec![false; problem.base.len()],
            stats: SolveStats::default(),
        }
    }

    pub fn stats(&self) -> &SolveStats {
        &self.stats
    }

    pub fn domains(&self) -> &DomainStore {
        &self.store
    }

    /// Solve with the given subset of top-level restrictions posted.
    ///
    /// Returns the lexicographically optimal solution, `None` if the
    /// problem is unsatisfiable, or an error when the budget runs out.
    pub fn solve(
        &mut self,
        restrictions: &[usize],
        budget: &Budget,
    ) -> Result<Option<Solution>, BudgetExhausted> {
        self.stats = SolveStats::default();
        debug!(
            restrictions = restrictions.len(),
            vars = self.problem.vars.len(),
            "solve start"
        );

        if !self.propagate_root(restrictions) {
            debug!("root propagation wiped a domain, unsatisfiable");
            return Ok(None);
        }
        if budget.exhausted(&self.stats) {
            return Err(BudgetExhausted);
        }

        let mut incumbent: Option<(Vec<i64>, Solution)> = None;
        self.search(budget, &mut incumbent)?;

        debug!(stats = ?self.stats, sat = incumbent.is_some(), "solve finished");
        Ok(incumbent.map(|(_, solution)| solution))
    }

    /// Reset all transient state, post the restrictions and propagate to
    /// fixpoint. Returns false on conflict.
    pub fn propagate_root(&mut self, restrictions: &[usize]) -> bool {
        self.store.reset(&self.problem.base);
        self.queue.clear();
        self.queued.iter_mut().for_each(|flag| *flag = false);

        // Every variable gets one initial pass so already-pinned domains
        // (ABSENT-only packages in particular) propagate their effects.
        for var in 0..self.store.len() {
            self.enqueue(var);
        }

        for &index in restrictions {
            let restriction = &self.problem.restrictions[index];
            if self.store.intersect(restriction.var, &restriction.mask) == Pruned::Wiped {
                self.clear_queue();
                return false;
            }
            self.enqueue(restriction.var);
        }

        self.propagate()
    }

    /// Begin an incremental blame probe: reset to the base domains and
    /// establish the empty-prefix fixpoint. Successive [`Self::post_probe`]
    /// calls then layer one restriction at a time onto the retained store,
    /// so every posting is evaluated against the state the previously
    /// accepted prefix left behind.
    pub fn begin_probe(&mut self) {
        self.store.reset(&self.problem.base);
        self.queue.clear();
        self.queued.iter_mut().for_each(|flag| *flag = false);
        for var in 0..self.store.len() {
            self.enqueue(var);
        }
        // every base domain keeps ABSENT, so the empty prefix cannot wipe
        let mut wiped = Vec::new();
        self.propagate_collecting(&mut wiped);
    }

    /// Post one restriction on top of the retained probe state and
    /// propagate, collecting every variable whose domain wipes instead of
    /// failing fast. `posted` lists the restrictions already layered onto
    /// the store by earlier calls.
    ///
    /// A wiped variable is dropped from the worklist, so its emptiness is
    /// not eliminated backwards into its dependers; the result names the
    /// proximate conflicts only. When the posting wipes its own variable,
    /// the demanded versions were eliminated before the posting: blame goes
    /// to the dependency targets that can no longer support them, unless an
    /// earlier posted restriction already excluded the version, in which
    /// case the constrained variable itself takes the blame.
    pub fn post_probe(&mut self, restriction: usize, posted: &[usize]) -> Vec<usize> {
        let problem = self.problem;
        let target = &problem.restrictions[restriction];
        let mut blamed = Vec::new();

        match self.store.intersect(target.var, &target.mask) {
            Pruned::Wiped => {
                for bit in target.mask.iter_ones() {
                    let excluded_earlier = posted.iter().any(|&index| {
                        let earlier = &problem.restrictions[index];
                        earlier.var == target.var && !earlier.mask.contains(bit)
                    });
                    if excluded_earlier {
                        continue;
                    }
                    for (dep, mask) in &problem.supports[target.var][bit_rank(bit)] {
                        if !self.store.domain(*dep).intersects(mask) && !blamed.contains(dep) {
                            blamed.push(*dep);
                        }
                    }
                }
                if blamed.is_empty() {
                    blamed.push(target.var);
                }
                return blamed;
            }
            Pruned::Narrowed => self.enqueue(target.var),
            Pruned::Unchanged => {}
        }

        self.propagate_collecting(&mut blamed);
        blamed
    }

    fn enqueue(&mut self, var: usize) {
        if !self.queued[var] {
            self.queued[var] = true;
            self.queue.push_back(var);
        }
    }

    fn clear_queue(&mut self) {
        while let Some(var) = self.queue.pop_front() {
            self.queued[var] = false;
        }
    }

    /// Run the worklist to fixpoint. Returns false as soon as any domain
    /// wipes.
    fn propagate(&mut self) -> bool {
        let problem = self.problem;
        while let Some(var) = self.queue.pop_front() {
            self.queued[var] = false;
            self.stats.propagations += 1;

            // A pinned version forces each dependency target into its
            // support set (which never includes ABSENT).
            if let Some(bit) = self.store.pinned(var) {
                if bit != ABSENT_BIT {
                    for (target, mask) in &problem.supports[var][bit_rank(bit)] {
                        match self.store.intersect(*target, mask) {
                            Pruned::Unchanged => {}
                            Pruned::Narrowed => self.enqueue(*target),
                            Pruned::Wiped => {
                                self.clear_queue();
                                return false;
                            }
                        }
                    }
                }
            }

            // Value elimination: a source version whose support no longer
            // intersects this domain is impossible.
            for (source, rank, mask) in &problem.rev[var] {
                let bit = rank_bit(*rank);
                if self.store.domain(*source).contains(bit)
                    && !self.store.domain(var).intersects(mask)
                {
                    self.store.remove(*source, bit);
                    if self.store.domain(*source).is_empty() {
                        self.clear_queue();
                        return false;
                    }
                    self.enqueue(*source);
                }
            }
        }
        true
    }

    /// Propagation variant for blame probes: wipes are recorded, the wiped
    /// variable is skipped from then on, and the run continues.
    fn propagate_collecting(&mut self, wiped: &mut Vec<usize>) {
        let problem = self.problem;
        while let Some(var) = self.queue.pop_front() {
            self.queued[var] = false;
            if self.store.domain(var).is_empty() {
                continue;
            }

            if let Some(bit) = self.store.pinned(var) {
                if bit != ABSENT_BIT {
                    for (target, mask) in &problem.supports[var][bit_rank(bit)] {
                        match self.store.intersect(*target, mask) {
                            Pruned::Unchanged => {}
                            Pruned::Narrowed => self.enqueue(*target),
                            Pruned::Wiped => {
                                if !wiped.contains(target) {
                                    wiped.push(*target);
                                }
                            }
                        }
                    }
                }
            }

            for (source, rank, mask) in &problem.rev[var] {
                let bit = rank_bit(*rank);
                if self.store.domain(*source).contains(bit)
                    && !self.store.domain(var).intersects(mask)
                {
                    self.store.remove(*source, bit);
                    if self.store.domain(*source).is_empty() {
                        if !wiped.contains(source) {
                            wiped.push(*source);
                        }
                    } else {
                        self.enqueue(*source);
                    }
                }
            }
        }
    }

    fn search(
        &mut self,
        budget: &Budget,
        incumbent: &mut Option<(Vec<i64>, Solution)>,
    ) -> Result<(), BudgetExhausted> {
        if let Some((best, _)) = incumbent {
            if self.cost_upper_bound() <= *best {
                return Ok(());
            }
        }

        let Some(var) = self.next_unassigned() else {
            let cost = self.cost_upper_bound();
            let improves = incumbent
                .as_ref()
                .map_or(true, |(best, _)| cost > *best);
            if improves {
                self.stats.solutions += 1;
                trace!(?cost, "new incumbent");
                *incumbent = Some((cost, self.extract_solution()));
            }
            return Ok(());
        };

        // Highest version first, ABSENT last where allowed.
        let domain = self.store.domain(var);
        let mut values: Vec<usize> = domain
            .iter_ones()
            .filter(|&bit| bit != ABSENT_BIT)
            .collect();
        values.sort_unstable_by(|a, b| b.cmp(a));
        if domain.contains(ABSENT_BIT) {
            values.push(ABSENT_BIT);
        }

        for bit in values {
            let level = self.store.push_level();
            self.stats.decisions += 1;
            trace!(var, bit, level, "decide");

            let mut consistent = self.store.pin(var, bit) != Pruned::Wiped;
            if consistent {
                self.enqueue(var);
                consistent = self.propagate();
            }
            if budget.exhausted(&self.stats) {
                self.store.backtrack_to(level);
                return Err(BudgetExhausted);
            }
            if consistent {
                self.search(budget, incumbent)?;
            }

            self.store.backtrack_to(level);
            self.stats.backtracks += 1;
            trace!(var, bit, "backtrack");
            if budget.exhausted(&self.stats) {
                return Err(BudgetExhausted);
            }
        }

        Ok(())
    }

    /// First unpinned variable in the fixed order: top-level variables in
    /// graph insertion order, then induced variables in discovery order.
    fn next_unassigned(&self) -> Option<usize> {
        (0..self.store.len()).find(|&var| self.store.pinned(var).is_none())
    }

    /// Lexicographic cost of the current domains, each component the best
    /// still achievable: top-level ranks (maximised), then the negated
    /// count of induced variables forced present (so fewer is better),
    /// then induced ranks. On a complete assignment this is the exact
    /// cost; on a partial one it is an optimistic bound, which is what
    /// makes it sound for pruning.
    fn cost_upper_bound(&self) -> Vec<i64> {
        let problem = self.problem;
        let mut cost = Vec::with_capacity(problem.vars.len() + 1);

        for var in 0..problem.top_count {
            cost.push(self.best_rank(var));
        }

        let forced_present = (problem.top_count..problem.vars.len())
            .filter(|&var| !self.store.domain(var).contains(ABSENT_BIT))
            .count() as i64;
        cost.push(-forced_present);

        for var in problem.top_count..problem.vars.len() {
            cost.push(self.best_rank(var));
        }

        cost
    }

    /// Highest version rank still in the domain, `-1` if only ABSENT
    /// remains.
    fn best_rank(&self, var: usize) -> i64 {
        match self.store.domain(var).max_set() {
            Some(bit) if bit != ABSENT_BIT => bit_rank(bit) as i64,
            _ => -1,
        }
    }

    fn extract_solution(&self) -> Solution {
        let values = (0..self.store.len())
            .map(|var| match self.store.pinned(var) {
                Some(ABSENT_BIT) | None => None,
                Some(bit) => Some(bit_rank(bit)),
            })
            .collect();
        Solution { values }
    }
}
