//! Single version constraint implementation

use std::fmt;

use thiserror::Error;

use super::Operator;
use crate::version::{Version, VersionError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("Invalid operator \"{operator}\", expected one of: {expected}")]
    InvalidOperator { operator: String, expected: String },

    #[error("Malformed constraint \"{input}\": {reason}")]
    Malformed { input: String, reason: String },

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// A single version constraint (e.g., ">= 1.0.0")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    operator: Operator,
    version: Version,
}

impl Constraint {
    /// Create a new constraint.
    ///
    /// The pessimistic operator needs at least `major.minor`; `~> 1` is
    /// rejected because its ceiling is undefined.
    pub fn new(operator: Operator, version: Version) -> Result<Self, ConstraintError> {
        if operator == Operator::Pessimistic && version.segments() < 2 {
            return Err(ConstraintError::Malformed {
                input: format!("~> {version}"),
                reason: "the pessimistic operator needs at least major.minor".to_string(),
            });
        }
        Ok(Constraint { operator, version })
    }

    /// Create a constraint from an operator string
    pub fn from_op_str(operator: &str, version: Version) -> Result<Self, ConstraintError> {
        let op = Operator::from_str(operator).map_err(|_| ConstraintError::InvalidOperator {
            operator: operator.to_string(),
            expected: Operator::supported_operators().join(", "),
        })?;
        Self::new(op, version)
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Check whether a concrete version satisfies this constraint.
    pub fn matches(&self, candidate: &Version) -> bool {
        match self.operator {
            Operator::Equal => candidate == &self.version,
            Operator::GreaterThan => candidate > &self.version,
            Operator::GreaterThanOrEqual => candidate >= &self.version,
            Operator::LessThan => candidate < &self.version,
            Operator::LessThanOrEqual => candidate <= &self.version,
            Operator::Pessimistic => {
                // new() guarantees the ceiling exists
                match self.version.pessimistic_ceiling() {
                    Some(ceiling) => candidate >= &self.version && candidate < &ceiling,
                    None => false,
                }
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator, self.version)
    }
}
