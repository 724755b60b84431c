//! Finite-domain dependency resolution.
//!
//! Given a universe of packages, each with versions and inter-version
//! dependencies, and a set of top-level constraints, this crate computes an
//! assignment of one version per reachable package that satisfies every
//! constraint, preferring newer versions and a smaller footprint, or
//! explains precisely why no such assignment exists.
//!
//! # Example
//!
//! ```
//! use solvent_resolver::{DependencyGraph, Selector, SolutionConstraint, SolveOptions};
//!
//! let mut graph = DependencyGraph::new();
//! let app = graph.package("app");
//! let lib = graph.package("lib");
//!
//! let app_1 = graph.add_version(app, "1.0.0".parse().unwrap());
//! graph.add_version(lib, "1.0.0".parse().unwrap());
//! graph.add_version(lib, "2.0.0".parse().unwrap());
//! graph.add_dependency(app, app_1, lib, ">= 1.0".parse().unwrap());
//!
//! let selector = Selector::new(&graph);
//! let assignment = selector
//!     .find_solution(&[SolutionConstraint::new("app")], &SolveOptions::default())
//!     .unwrap();
//!
//! assert_eq!(assignment["lib"].to_string(), "2.0.0");
//! ```
//!
//! The graph is read-only during a solve; each solve owns its transient
//! state, so concurrent solves may share one graph.

mod error;
mod graph;
mod selector;
pub mod solver;

pub use error::{InvalidSolutionConstraints, NoSolutionExists, SolveError};
pub use graph::{Dependency, DependencyGraph, Package, PackageId, PackageVersion, VersionId};
pub use selector::{Assignment, Selector, SolutionConstraint, SolveOptions};

pub use solvent_semver::{
    Constraint, ConstraintError, Operator, Version, VersionConstraint, VersionError,
};
