//! Finite-domain solver for package dependency resolution.
//!
//! This module implements a constraint solver over one integer variable per
//! reachable package, with branch-and-bound optimisation toward newer
//! versions and a diagnosis layer for the unsatisfiable case.
//!
//! # Architecture
//!
//! The solver consists of several key components:
//!
//! - [`Problem`]: variables, domains and support tables built from a graph
//! - [`DomainStore`]: bitset domains with a trail for cheap backtracking
//! - [`Solver`]: propagation to fixpoint plus depth-first branch-and-bound
//! - [`diagnose`]: probing machinery that explains an unsatisfiable input
//!
//! # Algorithm Overview
//!
//! 1. **Problem construction**: breadth-first reachability from the
//!    top-level packages; dependency edges become per-version support masks
//! 2. **Propagation**: value elimination run to fixpoint through a
//!    duplicate-suppressing worklist
//! 3. **Search**: fixed variable order (top-level first), values tried
//!    newest first with ABSENT last
//! 4. **Optimisation**: the first feasible assignment becomes the
//!    incumbent; search continues under an optimistic-bound prune until the
//!    lexicographically best assignment is proven
//! 5. **Diagnosis**: on UNSAT, prefix probes locate the offending
//!    constraint, blame counting names the most constrained package, and
//!    simple-path enumeration renders the conflicting requirement chains

mod builder;
mod domain;
mod problem;
#[allow(clippy::module_inception)]
mod solver;

#[cfg(test)]
mod tests;

pub use builder::{Problem, Reachability, Restriction, Var};
pub use domain::{Bits, DomainStore, Pruned, ABSENT_BIT};
pub use problem::diagnose;
pub use solver::{Budget, BudgetExhausted, Solution, SolveStats, Solver};
