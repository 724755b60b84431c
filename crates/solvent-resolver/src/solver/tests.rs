//! Resolution scenarios exercised end to end through the selector facade.
//!
//! Most tests share one fixture graph; the expected outcomes cover
//! soundness, optimality, determinism and the diagnosis of unsatisfiable
//! inputs.

use std::collections::HashSet;

use solvent_semver::{Version, VersionConstraint};

use crate::error::SolveError;
use crate::graph::DependencyGraph;
use crate::selector::{Assignment, Selector, SolutionConstraint, SolveOptions};
use crate::solver::{Budget, Problem, Reachability, Solver};

fn v(s: &str) -> Version {
    s.parse().unwrap()
}

fn vc(s: &str) -> VersionConstraint {
    s.parse().unwrap()
}

/// Require a package at any version
fn require(package: &str) -> SolutionConstraint {
    SolutionConstraint::new(package)
}

/// Require a package at a constrained version
fn require_at(package: &str, constraint: &str) -> SolutionConstraint {
    SolutionConstraint::constrained(package, vc(constraint))
}

fn solve(
    graph: &DependencyGraph,
    constraints: &[SolutionConstraint],
) -> Result<Assignment, SolveError> {
    Selector::new(graph).find_solution(constraints, &SolveOptions::default())
}

/// Check an assignment against expected (package, version) pairs, order
/// included: top-level packages first, induced packages in discovery order.
fn check_assignment(assignment: &Assignment, expected: &[(&str, &str)]) {
    let actual: Vec<(String, String)> = assignment
        .iter()
        .map(|(name, version)| (name.clone(), version.to_string()))
        .collect();
    let expected: Vec<(String, String)> = expected
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect();
    assert_eq!(actual, expected);
}

/// Every dependency of every chosen version must be satisfied by the
/// assignment.
fn check_sound(graph: &DependencyGraph, assignment: &Assignment) {
    for (name, version) in assignment {
        let id = graph.lookup(name).expect("assigned package exists");
        let chosen = graph
            .get(id)
            .versions()
            .iter()
            .find(|pv| pv.version() == version)
            .expect("assigned version exists");
        for dep in chosen.dependencies() {
            let target = graph.name(dep.target);
            let target_version = assignment
                .get(target)
                .unwrap_or_else(|| panic!("{name} {version} needs {target}, which is absent"));
            assert!(
                dep.constraint.matches(target_version),
                "{name} {version} needs {target} {}, got {target_version}",
                dep.constraint
            );
        }
    }
}

/// The shared fixture:
/// `A:{1,2}, B:{1,2,3}, C:{1,2}, D:{1,2}` with
/// `A1→B=1, A1→D=2; A2→B>=2, A2→C=1; B3→D=1; C2→D=2`.
fn fixture() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    let a = graph.package("A");
    let b = graph.package("B");
    let c = graph.package("C");
    let d = graph.package("D");

    let a1 = graph.add_version(a, v("1"));
    let a2 = graph.add_version(a, v("2"));
    graph.add_version(b, v("1"));
    graph.add_version(b, v("2"));
    let b3 = graph.add_version(b, v("3"));
    graph.add_version(c, v("1"));
    let c2 = graph.add_version(c, v("2"));
    graph.add_version(d, v("1"));
    graph.add_version(d, v("2"));

    graph.add_dependency(a, a1, b, vc("= 1"));
    graph.add_dependency(a, a1, d, vc("= 2"));
    graph.add_dependency(a, a2, b, vc(">= 2"));
    graph.add_dependency(a, a2, c, vc("= 1"));
    graph.add_dependency(b, b3, d, vc("= 1"));
    graph.add_dependency(c, c2, d, vc("= 2"));

    graph
}

// ============================================================================
// Satisfiable scenarios
// ============================================================================

#[test]
fn test_pinning_b_forces_the_older_a() {
    let graph = fixture();
    let assignment = solve(&graph, &[require("A"), require_at("B", "= 1")]).unwrap();

    // A2 needs B >= 2, so pinning B to 1 drops A to 1, which pulls in D
    check_assignment(&assignment, &[("A", "1"), ("B", "1"), ("D", "2")]);
    check_sound(&graph, &assignment);
}

#[test]
fn test_tight_b_range_cascades_through_the_graph() {
    let graph = fixture();
    let assignment = solve(&graph, &[require("A"), require_at("B", ">= 2.1")]).unwrap();

    // B >= 2.1 leaves only B3, which needs D1; A1 is out (needs B = 1)
    check_assignment(&assignment, &[("A", "2"), ("B", "3"), ("D", "1"), ("C", "1")]);
    check_sound(&graph, &assignment);
}

#[test]
fn test_unconstrained_solve_prefers_newest_and_smallest() {
    let graph = fixture();
    let assignment = solve(&graph, &[require("A")]).unwrap();

    // newest A, its induced closure at newest matching versions, D absent:
    // B3 would drag D in, so the smaller footprint wins over a newer B
    check_assignment(&assignment, &[("A", "2"), ("B", "2"), ("C", "1")]);
    check_sound(&graph, &assignment);
}

#[test]
fn test_cyclic_graphs_resolve() {
    let mut graph = DependencyGraph::new();
    let a = graph.package("a");
    let b = graph.package("b");
    let a1 = graph.add_version(a, v("1.0.0"));
    let b1 = graph.add_version(b, v("1.0.0"));
    graph.add_dependency(a, a1, b, vc("= 1.0.0"));
    graph.add_dependency(b, b1, a, vc("= 1.0.0"));

    let assignment = solve(&graph, &[require("a")]).unwrap();
    check_assignment(&assignment, &[("a", "1.0.0"), ("b", "1.0.0")]);
    check_sound(&graph, &assignment);
}

#[test]
fn test_prerelease_is_not_preferred_over_release() {
    let mut graph = DependencyGraph::new();
    let a = graph.package("a");
    graph.add_version(a, v("2.0.0-rc.1"));
    graph.add_version(a, v("2.0.0"));

    let assignment = solve(&graph, &[require("a")]).unwrap();
    check_assignment(&assignment, &[("a", "2.0.0")]);
}

#[test]
fn test_determinism_of_assignments() {
    let graph = fixture();
    let constraints = [require("A"), require_at("B", ">= 2.1")];
    let first = solve(&graph, &constraints).unwrap();
    let second = solve(&graph, &constraints).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Unsatisfiable scenarios and diagnosis
// ============================================================================

#[test]
fn test_conflicting_requirements_on_d_are_diagnosed() {
    let graph = fixture();
    let err = solve(&graph, &[require_at("B", "= 3"), require_at("C", "= 2")]).unwrap_err();

    let SolveError::NoSolutionExists(diagnosis) = err else {
        panic!("expected NoSolutionExists, got {err:?}");
    };

    // adding the C constraint flips the problem, and D takes the blame
    assert_eq!(diagnosis.offending_constraint_index, 1);
    assert_eq!(diagnosis.most_constrained_package, "D");

    let b_path = vec![
        ("B".to_string(), "= 3".to_string()),
        ("D".to_string(), "= 1".to_string()),
    ];
    let c_path = vec![
        ("C".to_string(), "= 2".to_string()),
        ("D".to_string(), "= 2".to_string()),
    ];
    assert!(diagnosis.paths.contains(&b_path), "paths: {:?}", diagnosis.paths);
    assert!(diagnosis.paths.contains(&c_path), "paths: {:?}", diagnosis.paths);

    assert!(diagnosis.message.contains("\"D\""));
    assert!(diagnosis.message.contains("B {= 3} -> D {= 1}"));
    assert!(diagnosis.message.contains("C {= 2} -> D {= 2}"));
}

#[test]
fn test_dependency_on_versionless_package_is_diagnosed() {
    let mut graph = DependencyGraph::new();
    let top = graph.package("depends_on_nosuch");
    let nosuch = graph.package("nosuch");
    let top_1 = graph.add_version(top, v("1"));
    graph.add_dependency(top, top_1, nosuch, vc("*"));

    let err = solve(&graph, &[require("depends_on_nosuch")]).unwrap_err();
    let SolveError::NoSolutionExists(diagnosis) = err else {
        panic!("expected NoSolutionExists, got {err:?}");
    };

    assert_eq!(diagnosis.offending_constraint_index, 0);
    assert_eq!(diagnosis.most_constrained_package, "nosuch");
    assert!(diagnosis
        .paths
        .contains(&vec![
            ("depends_on_nosuch".to_string(), "*".to_string()),
            ("nosuch".to_string(), "*".to_string()),
        ]));
}

#[test]
fn test_blame_ties_break_to_lexicographically_smallest_name() {
    let mut graph = DependencyGraph::new();
    let top = graph.package("top");
    let zeta = graph.package("zeta");
    let alpha = graph.package("alpha");
    let top_1 = graph.add_version(top, v("1"));
    graph.add_version(zeta, v("2"));
    graph.add_version(alpha, v("2"));
    // both dependencies are impossible, so both wipe exactly once
    graph.add_dependency(top, top_1, zeta, vc("= 1"));
    graph.add_dependency(top, top_1, alpha, vc("= 1"));

    let err = solve(&graph, &[require("top")]).unwrap_err();
    let SolveError::NoSolutionExists(diagnosis) = err else {
        panic!("expected NoSolutionExists, got {err:?}");
    };
    assert_eq!(diagnosis.most_constrained_package, "alpha");
}

#[test]
fn test_directly_conflicting_top_level_constraints_blame_their_package() {
    let graph = fixture();
    let err = solve(&graph, &[require_at("A", "= 1"), require_at("A", "= 2")]).unwrap_err();

    let SolveError::NoSolutionExists(diagnosis) = err else {
        panic!("expected NoSolutionExists, got {err:?}");
    };

    // the second pin excludes the versions the first one kept, so the
    // conflict sits with A itself, not with A's dependencies
    assert_eq!(diagnosis.offending_constraint_index, 1);
    assert_eq!(diagnosis.most_constrained_package, "A");
    assert!(diagnosis
        .paths
        .contains(&vec![("A".to_string(), "= 1".to_string())]));
    assert!(diagnosis
        .paths
        .contains(&vec![("A".to_string(), "= 2".to_string())]));
}

#[test]
fn test_validation_reports_every_violation_at_once() {
    let graph = fixture();
    let err = solve(
        &graph,
        &[
            require("nosuch"),
            require("nosuch2"),
            require_at("A", ">= 10"),
            require_at("B", ">= 50"),
        ],
    )
    .unwrap_err();

    let SolveError::InvalidSolutionConstraints(invalid) = err else {
        panic!("expected InvalidSolutionConstraints, got {err:?}");
    };
    assert_eq!(invalid.non_existent, vec!["nosuch", "nosuch2"]);
    assert_eq!(invalid.constrained_to_no_versions, vec!["A", "B"]);
}

#[test]
fn test_diagnosis_is_deterministic() {
    let graph = fixture();
    let constraints = [require_at("B", "= 3"), require_at("C", "= 2")];

    let errors: Vec<String> = (0..2)
        .map(|_| match solve(&graph, &constraints).unwrap_err() {
            SolveError::NoSolutionExists(diagnosis) => diagnosis.message,
            other => panic!("expected NoSolutionExists, got {other:?}"),
        })
        .collect();
    assert_eq!(errors[0], errors[1]);
}

/// Pairwise-consistent but globally infeasible cycle: propagation alone
/// cannot refute it, so the search has to backtrack.
fn contradiction_ring() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    let x = graph.package("x");
    let y = graph.package("y");
    let z = graph.package("z");
    let (v1, v2) = (0, 1);
    for package in [x, y, z] {
        assert_eq!(graph.add_version(package, v("1")), v1);
        assert_eq!(graph.add_version(package, v("2")), v2);
    }
    graph.add_dependency(x, v1, y, vc("= 1"));
    graph.add_dependency(x, v2, y, vc("= 2"));
    graph.add_dependency(y, v1, z, vc("= 1"));
    graph.add_dependency(y, v2, z, vc("= 2"));
    graph.add_dependency(z, v1, x, vc("= 2"));
    graph.add_dependency(z, v2, x, vc("= 1"));
    graph
}

#[test]
fn test_search_level_conflicts_are_still_unsat() {
    let graph = contradiction_ring();
    let err = solve(&graph, &[require("x")]).unwrap_err();
    assert!(matches!(err, SolveError::NoSolutionExists(_)), "got {err:?}");
}

// ============================================================================
// Options: budgets and valid packages
// ============================================================================

#[test]
fn test_backtrack_budget_exhaustion() {
    let graph = contradiction_ring();
    let options = SolveOptions {
        max_backtracks: Some(0),
        ..SolveOptions::default()
    };
    let err = Selector::new(&graph)
        .find_solution(&[require("x")], &options)
        .unwrap_err();
    assert!(matches!(err, SolveError::TimeBoundExceeded), "got {err:?}");
}

#[test]
fn test_wall_clock_budget_exhaustion() {
    let graph = fixture();
    let options = SolveOptions {
        timeout_ms: Some(0),
        ..SolveOptions::default()
    };
    let err = Selector::new(&graph)
        .find_solution(&[require("A")], &options)
        .unwrap_err();
    assert!(matches!(err, SolveError::TimeBoundExceeded), "got {err:?}");
}

#[test]
fn test_valid_packages_drop_excluded_dependents() {
    let graph = fixture();
    // without C, A2 is impossible and the solver falls back to A1
    let options = SolveOptions {
        valid_packages: Some(
            ["A", "B", "D"].into_iter().map(String::from).collect::<HashSet<_>>(),
        ),
        ..SolveOptions::default()
    };
    let assignment = Selector::new(&graph)
        .find_solution(&[require("A")], &options)
        .unwrap();
    check_assignment(&assignment, &[("A", "1"), ("B", "1"), ("D", "2")]);
    check_sound(&graph, &assignment);
}

#[test]
fn test_valid_packages_can_make_the_problem_unsat() {
    let mut graph = DependencyGraph::new();
    let app = graph.package("app");
    let lib = graph.package("lib");
    let app_1 = graph.add_version(app, v("1.0.0"));
    graph.add_version(lib, v("1.0.0"));
    graph.add_dependency(app, app_1, lib, vc("*"));

    let options = SolveOptions {
        valid_packages: Some(["app".to_string()].into_iter().collect()),
        ..SolveOptions::default()
    };
    let err = Selector::new(&graph)
        .find_solution(&[require("app")], &options)
        .unwrap_err();
    assert!(matches!(err, SolveError::NoSolutionExists(_)), "got {err:?}");
}

// ============================================================================
// Solver internals observable through the public surface
// ============================================================================

#[test]
fn test_solver_stats_are_populated() {
    let graph = fixture();
    let resolved = vec![(graph.lookup("A").unwrap(), vc("*"))];
    let problem = Problem::build(&graph, &resolved, None, Reachability::Restricted);
    let mut solver = Solver::new(&problem);

    let all: Vec<usize> = (0..problem.restrictions.len()).collect();
    let solution = solver.solve(&all, &Budget::default()).unwrap();
    assert!(solution.is_some());
    assert!(solver.stats().decisions > 0);
    assert!(solver.stats().propagations > 0);
    assert!(solver.stats().solutions > 0);
}

#[test]
fn test_solver_is_reusable_across_restriction_subsets() {
    let graph = fixture();
    let resolved = vec![
        (graph.lookup("B").unwrap(), vc("= 3")),
        (graph.lookup("C").unwrap(), vc("= 2")),
    ];
    let problem = Problem::build(&graph, &resolved, None, Reachability::Full);
    let mut solver = Solver::new(&problem);

    // each prefix alone is fine, together they are not
    assert!(solver.solve(&[0], &Budget::default()).unwrap().is_some());
    assert!(solver.solve(&[1], &Budget::default()).unwrap().is_some());
    assert!(solver.solve(&[0, 1], &Budget::default()).unwrap().is_none());
    // and the solver recovers afterwards
    assert!(solver.solve(&[0], &Budget::default()).unwrap().is_some());
}
