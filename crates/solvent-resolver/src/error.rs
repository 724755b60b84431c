//! Error taxonomy of the resolver.

use std::fmt;

use thiserror::Error;

use solvent_semver::{ConstraintError, VersionError};

/// Aggregate of every invalid top-level constraint, reported before any
/// solving starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvalidSolutionConstraints {
    /// Constrained packages that have no versions at all.
    pub non_existent: Vec<String>,
    /// Existing packages whose constraint matches none of their versions.
    pub constrained_to_no_versions: Vec<String>,
}

impl InvalidSolutionConstraints {
    pub fn is_empty(&self) -> bool {
        self.non_existent.is_empty() && self.constrained_to_no_versions.is_empty()
    }
}

impl fmt::Display for InvalidSolutionConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invalid solution constraints:")?;
        if !self.non_existent.is_empty() {
            write!(f, " non-existent packages: [{}]", self.non_existent.join(", "))?;
        }
        if !self.constrained_to_no_versions.is_empty() {
            write!(
                f,
                " constrained to no versions: [{}]",
                self.constrained_to_no_versions.join(", ")
            )?;
        }
        Ok(())
    }
}

/// Why resolution failed: the first offending top-level constraint, the
/// package the conflict converges on, and the requirement paths that pin
/// it down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoSolutionExists {
    /// Zero-based index into the top-level constraint list of the first
    /// constraint whose prefix is unsatisfiable.
    pub offending_constraint_index: usize,
    pub most_constrained_package: String,
    /// Requirement chains, each a list of `(package, rendered constraint)`
    /// pairs: the first pair carries a top-level constraint, every later
    /// pair the dependency constraint leading into that package.
    pub paths: Vec<Vec<(String, String)>>,
    /// Rendered explanation, suitable for direct display.
    pub message: String,
}

impl fmt::Display for NoSolutionExists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Error, Debug)]
pub enum SolveError {
    #[error("{0}")]
    InvalidSolutionConstraints(InvalidSolutionConstraints),

    #[error("{0}")]
    NoSolutionExists(NoSolutionExists),

    #[error("Resolution budget exhausted before a result was proven")]
    TimeBoundExceeded,

    #[error(transparent)]
    MalformedVersion(#[from] VersionError),

    #[error(transparent)]
    MalformedConstraint(#[from] ConstraintError),
}
