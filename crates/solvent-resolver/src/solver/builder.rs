//! Translation of a dependency graph plus top-level constraints into a
//! finite-domain problem.
//!
//! One variable per reachable package. A variable's domain holds the
//! package's version ranks (ascending version order) plus the ABSENT value;
//! dependency edges become per-rank support masks over the target variable.

use std::collections::{HashMap, HashSet, VecDeque};

use solvent_semver::VersionConstraint;

use crate::graph::{DependencyGraph, PackageId, VersionId};
use crate::solver::domain::{rank_bit, Bits, ABSENT_BIT};

/// How far the reachability scan follows dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// Follow edges only from versions that survive the top-level
    /// constraints. Used for regular solving.
    Restricted,
    /// Follow every edge, producing a conservative overestimate whose extra
    /// variables pin to ABSENT. Used by the diagnoser, whose probes post
    /// varying constraint subsets against one shared variable universe.
    Full,
}

/// One CSP variable.
#[derive(Debug)]
pub struct Var {
    pub package: PackageId,
    pub top_level: bool,
    /// Version ids in ascending version order; rank `r` is `ranks[r]`.
    pub ranks: Vec<VersionId>,
}

impl Var {
    /// Domain capacity in bits: one per rank plus ABSENT.
    pub fn capacity(&self) -> usize {
        self.ranks.len() + 1
    }
}

/// A top-level constraint lowered onto its variable: the set of version
/// bits the constraint accepts. ABSENT is never in the mask.
#[derive(Debug)]
pub struct Restriction {
    pub var: usize,
    pub mask: Bits,
}

/// The finite-domain problem: variables, base domains, support tables and
/// the lowered top-level restrictions.
///
/// The problem itself is immutable during solving; solvers layer a
/// [`DomainStore`](crate::solver::domain::DomainStore) on top of `base`.
#[derive(Debug)]
pub struct Problem {
    pub vars: Vec<Var>,
    pub var_of: HashMap<PackageId, usize>,
    /// `supports[v][r]` lists `(target, mask)`: if variable `v` takes rank
    /// `r`, each target's domain must intersect the mask (which never
    /// contains ABSENT).
    pub supports: Vec<Vec<Vec<(usize, Bits)>>>,
    /// Reverse index of `supports`: for each variable, the `(source,
    /// source_rank, mask)` entries that target it.
    pub rev: Vec<Vec<(usize, usize, Bits)>>,
    /// Domain of every variable before any restriction is posted.
    pub base: Vec<Bits>,
    pub restrictions: Vec<Restriction>,
    /// Variables `0..top_count` are top-level, the rest induced.
    pub top_count: usize,
}

impl Problem {
    /// Build the problem for `constraints` over `graph`.
    ///
    /// Constraint packages must exist in the graph (the caller validates).
    /// `valid` optionally limits which packages may be present in a
    /// solution; anything outside the set gets an ABSENT-only domain.
    pub fn build(
        graph: &DependencyGraph,
        constraints: &[(PackageId, VersionConstraint)],
        valid: Option<&HashSet<PackageId>>,
        reachability: Reachability,
    ) -> Self {
        // Top-level variables first, in graph insertion order.
        let mut top_packages: Vec<PackageId> = constraints.iter().map(|&(p, _)| p).collect();
        top_packages.sort_unstable();
        top_packages.dedup();

        let allowed = |package: PackageId| valid.map_or(true, |set| set.contains(&package));

        let mut vars: Vec<Var> = Vec::new();
        let mut var_of: HashMap<PackageId, usize> = HashMap::new();
        let mut queue: VecDeque<usize> = VecDeque::new();

        let mut add_var = |package: PackageId,
                           top_level: bool,
                           vars: &mut Vec<Var>,
                           var_of: &mut HashMap<PackageId, usize>,
                           queue: &mut VecDeque<usize>| {
            let ranks = graph.get(package).sorted_version_ids();
            vars.push(Var {
                package,
                top_level,
                ranks,
            });
            var_of.insert(package, vars.len() - 1);
            queue.push_back(vars.len() - 1);
        };

        for &package in &top_packages {
            add_var(package, true, &mut vars, &mut var_of, &mut queue);
        }
        let top_count = vars.len();

        // Breadth-first discovery of induced packages.
        while let Some(v) = queue.pop_front() {
            let package = vars[v].package;
            if !allowed(package) {
                // nothing may depend through an excluded package
                continue;
            }
            let ranks = vars[v].ranks.clone();
            let top_level = vars[v].top_level;
            for &vid in &ranks {
                let version = graph.get(package).versions()[vid].version();
                if reachability == Reachability::Restricted
                    && top_level
                    && !survives_top_constraints(constraints, package, version)
                {
                    continue;
                }
                for dep in graph.get(package).versions()[vid].dependencies() {
                    if !var_of.contains_key(&dep.target) {
                        add_var(dep.target, false, &mut vars, &mut var_of, &mut queue);
                    }
                }
            }
        }

        // Base domains.
        let base: Vec<Bits> = vars
            .iter()
            .map(|var| {
                let mut bits = Bits::empty(var.capacity());
                bits.set(ABSENT_BIT);
                if allowed(var.package) {
                    for rank in 0..var.ranks.len() {
                        bits.set(rank_bit(rank));
                    }
                }
                bits
            })
            .collect();

        // Lowered top-level restrictions.
        let restrictions = constraints
            .iter()
            .map(|(package, constraint)| {
                let v = var_of[package];
                let var = &vars[v];
                let mut mask = Bits::empty(var.capacity());
                for (rank, &vid) in var.ranks.iter().enumerate() {
                    let version = graph.get(*package).versions()[vid].version();
                    if constraint.matches(version) {
                        mask.set(rank_bit(rank));
                    }
                }
                Restriction { var: v, mask }
            })
            .collect();

        // Support tables.
        let mut supports: Vec<Vec<Vec<(usize, Bits)>>> = Vec::with_capacity(vars.len());
        for var in &vars {
            let mut per_rank = Vec::with_capacity(var.ranks.len());
            for &vid in &var.ranks {
                let mut deps = Vec::new();
                for dep in graph.get(var.package).versions()[vid].dependencies() {
                    let Some(&target) = var_of.get(&dep.target) else {
                        // Restricted reachability skipped this edge; its
                        // source rank is removed by the restrictions before
                        // propagation ever runs.
                        continue;
                    };
                    let target_var = &vars[target];
                    let mut mask = Bits::empty(target_var.capacity());
                    for (rank, &target_vid) in target_var.ranks.iter().enumerate() {
                        let version = graph.get(dep.target).versions()[target_vid].version();
                        if dep.constraint.matches(version) {
                            mask.set(rank_bit(rank));
                        }
                    }
                    deps.push((target, mask));
                }
                per_rank.push(deps);
            }
            supports.push(per_rank);
        }

        // Reverse index.
        let mut rev: Vec<Vec<(usize, usize, Bits)>> = vec![Vec::new(); vars.len()];
        for (source, per_rank) in supports.iter().enumerate() {
            for (rank, deps) in per_rank.iter().enumerate() {
                for (target, mask) in deps {
                    rev[*target].push((source, rank, mask.clone()));
                }
            }
        }

        Self {
            vars,
            var_of,
            supports,
            rev,
            base,
            restrictions,
            top_count,
        }
    }
}

/// Whether a top-level package's version survives every top-level
/// constraint on it; dependency edges of filtered-out versions are not
/// followed during restricted reachability.
fn survives_top_constraints(
    constraints: &[(PackageId, VersionConstraint)],
    package: PackageId,
    version: &solvent_semver::Version,
) -> bool {
    constraints
        .iter()
        .filter(|&&(p, _)| p == package)
        .all(|(_, constraint)| constraint.matches(version))
}
