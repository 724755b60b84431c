//! Version and version-constraint handling for the solvent dependency
//! resolver.
//!
//! This crate is standalone: it knows nothing about packages or solving,
//! only about [`Version`] values with a total order and [`VersionConstraint`]
//! predicates over them.
//!
//! # Syntax
//!
//! Versions are `MAJOR[.MINOR[.PATCH]][-PRE][+BUILD]`; missing minor/patch
//! default to zero. Constraints are whitespace-separated conjunctions of
//! `OP VERSION` atoms with `OP` one of `=`, `==`, `>`, `>=`, `<`, `<=`, `~>`;
//! a bare version means equality and `*` is the match-anything default.

mod constraint;
mod version;

pub use constraint::{Constraint, ConstraintError, Operator, VersionConstraint};
pub use version::{Version, VersionError};
