//! The resolution facade: validation, solving, diagnosis.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use solvent_semver::{Version, VersionConstraint};

use crate::error::{InvalidSolutionConstraints, SolveError};
use crate::graph::{DependencyGraph, PackageId};
use crate::solver::{diagnose, Budget, Problem, Reachability, Solver};

/// A top-level requirement: the package must be present in the solution,
/// at a version accepted by the constraint.
#[derive(Debug, Clone)]
pub struct SolutionConstraint {
    pub package: String,
    pub constraint: VersionConstraint,
}

impl SolutionConstraint {
    /// Require a package at any version.
    pub fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            constraint: VersionConstraint::any(),
        }
    }

    /// Require a package at a constrained version.
    pub fn constrained(package: &str, constraint: VersionConstraint) -> Self {
        Self {
            package: package.to_string(),
            constraint,
        }
    }
}

/// Knobs for one `find_solution` call.
#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    /// Wall-clock budget for the whole call, diagnosis included.
    pub timeout_ms: Option<u32>,
    /// Backtrack budget per solve run.
    pub max_backtracks: Option<u64>,
    /// When set, only these packages may appear in the solution;
    /// dependencies into anything else force the depending version out.
    pub valid_packages: Option<HashSet<String>>,
}

/// The result of a successful resolution: chosen version per present
/// package, ordered top-level packages first, then induced packages in
/// discovery order. Absent packages do not appear.
pub type Assignment = IndexMap<String, Version>;

/// Entry point tying the pieces together: validates the top-level
/// constraints, builds the finite-domain problem, solves it, and runs the
/// diagnoser when no solution exists.
pub struct Selector<'a> {
    graph: &'a DependencyGraph,
}

impl<'a> Selector<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Resolve the given top-level constraints against the graph.
    pub fn find_solution(
        &self,
        constraints: &[SolutionConstraint],
        options: &SolveOptions,
    ) -> Result<Assignment, SolveError> {
        let resolved = self.validate(constraints)?;
        if resolved.is_empty() {
            return Ok(Assignment::new());
        }

        let valid: Option<HashSet<PackageId>> = options.valid_packages.as_ref().map(|names| {
            names
                .iter()
                .filter_map(|name| self.graph.lookup(name))
                .collect()
        });

        let budget = Budget::new(options.timeout_ms, options.max_backtracks);
        let problem = Problem::build(
            self.graph,
            &resolved,
            valid.as_ref(),
            Reachability::Restricted,
        );
        let mut solver = Solver::new(&problem);
        let all: Vec<usize> = (0..problem.restrictions.len()).collect();

        match solver.solve(&all, &budget) {
            Err(_) => Err(SolveError::TimeBoundExceeded),
            Ok(Some(solution)) => {
                let mut assignment = Assignment::new();
                for (var, value) in solution.values.iter().enumerate() {
                    if let Some(rank) = value {
                        let info = &problem.vars[var];
                        let package = self.graph.get(info.package);
                        let version = package.versions()[info.ranks[*rank]].version().clone();
                        assignment.insert(package.name().to_string(), version);
                    }
                }
                Ok(assignment)
            }
            Ok(None) => {
                debug!("no solution exists, diagnosing");
                let full =
                    Problem::build(self.graph, &resolved, valid.as_ref(), Reachability::Full);
                match diagnose(self.graph, &resolved, &full, &budget) {
                    Ok(diagnosis) => Err(SolveError::NoSolutionExists(diagnosis)),
                    Err(_) => Err(SolveError::TimeBoundExceeded),
                }
            }
        }
    }

    /// Check every top-level constraint before any solving: constrained
    /// packages must exist and keep at least one version. All violations
    /// are aggregated into a single error.
    fn validate(
        &self,
        constraints: &[SolutionConstraint],
    ) -> Result<Vec<(PackageId, VersionConstraint)>, SolveError> {
        let mut invalid = InvalidSolutionConstraints::default();
        let mut resolved = Vec::with_capacity(constraints.len());

        for top in constraints {
            match self.graph.lookup(&top.package) {
                Some(id) if self.graph.get(id).exists() => {
                    if self.graph.get(id).versions_matching(&top.constraint).is_empty() {
                        invalid.constrained_to_no_versions.push(top.package.clone());
                    } else {
                        resolved.push((id, top.constraint.clone()));
                    }
                }
                _ => invalid.non_existent.push(top.package.clone()),
            }
        }

        if invalid.is_empty() {
            Ok(resolved)
        } else {
            Err(SolveError::InvalidSolutionConstraints(invalid))
        }
    }
}
