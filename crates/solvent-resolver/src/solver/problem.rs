//! Failure diagnosis: why a set of top-level constraints is unsatisfiable.
//!
//! Three questions are answered, each by probing the solver against
//! subsets of the top-level constraints:
//!
//! 1. which constraint first makes the problem infeasible (binary search
//!    over prefixes),
//! 2. which package the conflict converges on (blame counting over the
//!    domains that wipe when the offending constraint is posted),
//! 3. which requirement chains pin that package down (simple paths in the
//!    graph of dependency arcs active during the probes).
//!
//! Probes share one variable universe, built with full reachability so a
//! subset of constraints never lacks a variable it needs.

use std::collections::BTreeMap;

use petgraph::algo::all_simple_paths;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::debug;

use solvent_semver::VersionConstraint;

use crate::error::NoSolutionExists;
use crate::graph::{DependencyGraph, PackageId};
use crate::solver::builder::Problem;
use crate::solver::domain::rank_bit;
use crate::solver::solver::{Budget, BudgetExhausted, Solver};

/// Diagnose an unsatisfiable constraint set.
///
/// `constraints` is the full, validated top-level list that the caller has
/// already proven UNSAT; `problem` must have been built from it with
/// [`Reachability::Full`](crate::solver::builder::Reachability::Full).
pub fn diagnose(
    graph: &DependencyGraph,
    constraints: &[(PackageId, VersionConstraint)],
    problem: &Problem,
    budget: &Budget,
) -> Result<NoSolutionExists, BudgetExhausted> {
    let mut checker = Solver::new(problem);

    let offending = find_offending_prefix(&mut checker, constraints.len(), budget)?;
    debug!(offending, "smallest unsatisfiable prefix found");

    let most_constrained =
        find_most_constrained(graph, constraints, problem, &mut checker, offending, budget)?;
    debug!(package = %most_constrained, "most constrained package");

    let paths = explanation_paths(graph, constraints, problem, offending, &most_constrained);

    let message = render_message(graph, constraints, offending, &most_constrained, &paths);

    Ok(NoSolutionExists {
        offending_constraint_index: offending - 1,
        most_constrained_package: most_constrained,
        paths,
        message,
    })
}

/// Goal 1: the smallest `k` such that constraints `0..k` are unsatisfiable.
/// Satisfiability is monotone in the prefix, so a binary search applies;
/// the empty prefix is trivially satisfiable.
fn find_offending_prefix(
    solver: &mut Solver<'_>,
    len: usize,
    budget: &Budget,
) -> Result<usize, BudgetExhausted> {
    let mut lo = 1;
    let mut hi = len;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let prefix: Vec<usize> = (0..mid).collect();
        if solver.solve(&prefix, budget)?.is_some() {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

/// Goal 2: grow the offending prefix one constraint at a time; each add is
/// posted incrementally on top of the state the previously accepted prefix
/// left behind (a satisfiable prefix never wipes, so the retained store is
/// exactly its fixpoint). Whenever an add flips the problem from
/// satisfiable to unsatisfiable, count every package whose domain wipes
/// under that posting. The package with the highest count wins, ties
/// broken by lexicographically smallest name.
fn find_most_constrained(
    graph: &DependencyGraph,
    constraints: &[(PackageId, VersionConstraint)],
    problem: &Problem,
    checker: &mut Solver<'_>,
    offending: usize,
    budget: &Budget,
) -> Result<String, BudgetExhausted> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let all: Vec<usize> = (0..offending).collect();

    let mut probe = Solver::new(problem);
    probe.begin_probe();
    let mut previous_sat = true;

    for grown in 1..=offending {
        let blamed = probe.post_probe(all[grown - 1], &all[..grown - 1]);
        let sat = if grown == offending {
            false
        } else {
            checker.solve(&all[..grown], budget)?.is_some()
        };

        if previous_sat && !sat {
            if blamed.is_empty() {
                // the conflict needed search to surface; blame the package
                // the added constraint targets
                let name = graph.name(constraints[grown - 1].0).to_string();
                *counts.entry(name).or_default() += 1;
            }
            for var in blamed {
                let name = graph.name(problem.vars[var].package).to_string();
                *counts.entry(name).or_default() += 1;
            }
        }
        previous_sat = sat;
    }

    // highest count wins; on ties the lexicographically smallest name
    let best = counts
        .iter()
        .min_by_key(|&(name, count)| (std::cmp::Reverse(*count), name.clone()))
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| graph.name(constraints[offending - 1].0).to_string());
    Ok(best)
}

/// Goal 3: enumerate the requirement chains that converge on the most
/// constrained package.
///
/// Nodes are the problem's variables; edges are the dependency arcs the
/// probes propagated over, i.e. arcs whose source version survives the
/// offending prefix's top-level restrictions. Every simple path from a
/// prefix-constrained package to the target is reported, plus a one-node
/// path for each prefix constraint on the target itself.
fn explanation_paths(
    graph: &DependencyGraph,
    constraints: &[(PackageId, VersionConstraint)],
    problem: &Problem,
    offending: usize,
    most_constrained: &str,
) -> Vec<Vec<(String, String)>> {
    let Some(target_package) = graph.lookup(most_constrained) else {
        return Vec::new();
    };
    let Some(&target_var) = problem.var_of.get(&target_package) else {
        return Vec::new();
    };

    let survives = |var: usize, rank: usize| {
        let bit = rank_bit(rank);
        problem.base[var].contains(bit)
            && problem.restrictions[..offending]
                .iter()
                .filter(|restriction| restriction.var == var)
                .all(|restriction| restriction.mask.contains(bit))
    };

    let mut dg: DiGraph<usize, VersionConstraint> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..problem.vars.len()).map(|var| dg.add_node(var)).collect();

    for (var, info) in problem.vars.iter().enumerate() {
        for (rank, &vid) in info.ranks.iter().enumerate() {
            if !survives(var, rank) {
                continue;
            }
            for dep in graph.get(info.package).versions()[vid].dependencies() {
                let Some(&dep_var) = problem.var_of.get(&dep.target) else {
                    continue;
                };
                let duplicate = dg
                    .edges_connecting(nodes[var], nodes[dep_var])
                    .any(|edge| *edge.weight() == dep.constraint);
                if !duplicate {
                    dg.add_edge(nodes[var], nodes[dep_var], dep.constraint.clone());
                }
            }
        }
    }

    let mut paths: Vec<Vec<(String, String)>> = Vec::new();

    for (package, constraint) in &constraints[..offending] {
        if *package == target_package {
            let path = vec![(most_constrained.to_string(), constraint.to_string())];
            if !paths.contains(&path) {
                paths.push(path);
            }
            continue;
        }
        let Some(&source_var) = problem.var_of.get(package) else {
            continue;
        };
        let top_label = top_level_label(constraints, offending, *package);

        for node_path in
            all_simple_paths::<Vec<NodeIndex>, _, std::collections::hash_map::RandomState>(
                &dg,
                nodes[source_var],
                nodes[target_var],
                0,
                None,
            )
        {
            for rendered in expand_edge_choices(graph, problem, &dg, &node_path) {
                let mut path = Vec::with_capacity(rendered.len() + 1);
                path.push((graph.name(*package).to_string(), top_label.clone()));
                path.extend(rendered);
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
    }

    paths.sort();
    paths
}

/// Rendered conjunction of every prefix constraint on a top-level package.
fn top_level_label(
    constraints: &[(PackageId, VersionConstraint)],
    offending: usize,
    package: PackageId,
) -> String {
    let combined = constraints[..offending]
        .iter()
        .filter(|&&(p, _)| p == package)
        .fold(VersionConstraint::any(), |acc, (_, c)| acc.intersect(c));
    combined.to_string()
}

/// A node path can cross parallel edges carrying different constraints;
/// expand one rendered tail per combination.
fn expand_edge_choices(
    graph: &DependencyGraph,
    problem: &Problem,
    dg: &DiGraph<usize, VersionConstraint>,
    node_path: &[NodeIndex],
) -> Vec<Vec<(String, String)>> {
    let mut tails: Vec<Vec<(String, String)>> = vec![Vec::new()];

    for window in node_path.windows(2) {
        let step_name = graph
            .name(problem.vars[dg[window[1]]].package)
            .to_string();
        let choices: Vec<String> = dg
            .edges_connecting(window[0], window[1])
            .map(|edge| edge.weight().to_string())
            .collect();

        let mut grown = Vec::with_capacity(tails.len() * choices.len());
        for tail in &tails {
            for choice in &choices {
                let mut next = tail.clone();
                next.push((step_name.clone(), choice.clone()));
                grown.push(next);
            }
        }
        tails = grown;
    }

    tails
}

fn render_message(
    graph: &DependencyGraph,
    constraints: &[(PackageId, VersionConstraint)],
    offending: usize,
    most_constrained: &str,
    paths: &[Vec<(String, String)>],
) -> String {
    let (package, constraint) = &constraints[offending - 1];
    let mut message = format!(
        "Unable to satisfy constraint #{} ({} {{{}}}): package \"{}\" is constrained to no remaining versions",
        offending,
        graph.name(*package),
        constraint,
        most_constrained,
    );
    for path in paths {
        message.push_str("\n  - ");
        message.push_str(&render_path(path));
    }
    message
}

fn render_path(path: &[(String, String)]) -> String {
    path.iter()
        .map(|(name, constraint)| format!("{name} {{{constraint}}}"))
        .collect::<Vec<_>>()
        .join(" -> ")
}
