//! Version constraints: single operator/version atoms and conjunctions.

use std::fmt;

mod constraint;
mod multi;

pub use constraint::{Constraint, ConstraintError};
pub use multi::VersionConstraint;

/// Comparison operator of a single constraint atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// The pessimistic operator `~>`: at least the given version, below its
    /// ceiling (`~> 1.2` caps at `2.0.0`, `~> 1.2.3` at `1.3.0`).
    Pessimistic,
}

impl Operator {
    /// Parse an operator token. `==` is accepted as an alias of `=`.
    pub fn from_str(op: &str) -> Result<Self, ()> {
        match op {
            "=" | "==" => Ok(Operator::Equal),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            "~>" => Ok(Operator::Pessimistic),
            _ => Err(()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::Pessimistic => "~>",
        }
    }

    /// All operator spellings accepted by the parser.
    pub fn supported_operators() -> Vec<&'static str> {
        vec!["=", "==", ">", ">=", "<", "<=", "~>"]
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
