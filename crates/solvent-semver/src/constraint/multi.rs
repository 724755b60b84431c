//! Conjunctions of constraint atoms.

use std::fmt;
use std::str::FromStr;

use super::constraint::{Constraint, ConstraintError};
use super::Operator;
use crate::version::Version;

/// A version constraint: the conjunction of one or more atoms.
///
/// The empty conjunction is the default constraint and accepts every
/// version; it parses from and renders as `*`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionConstraint {
    constraints: Vec<Constraint>,
}

impl VersionConstraint {
    /// The default constraint, accepting any version.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_any(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn atoms(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Parse a whitespace-separated list of atoms, each `OP VERSION` with
    /// optional space between operator and version. A bare version means
    /// equality: `"1.2"` is `"= 1.2"`.
    pub fn parse(input: &str) -> Result<Self, ConstraintError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ConstraintError::Malformed {
                input: input.to_string(),
                reason: "empty constraint".to_string(),
            });
        }
        if trimmed == "*" {
            return Ok(Self::any());
        }

        let mut constraints = Vec::new();
        let mut tokens = trimmed.split_whitespace();

        while let Some(token) = tokens.next() {
            let split_at = token
                .find(|ch| !matches!(ch, '=' | '<' | '>' | '~'))
                .unwrap_or(token.len());
            let (op_str, version_str) = token.split_at(split_at);

            let constraint = if op_str.is_empty() {
                // bare version, implied equality
                Constraint::new(Operator::Equal, version_str.parse()?)?
            } else if version_str.is_empty() {
                // operator alone, version is the next token
                let version = tokens.next().ok_or_else(|| ConstraintError::Malformed {
                    input: input.to_string(),
                    reason: format!("operator \"{op_str}\" is missing a version"),
                })?;
                Constraint::from_op_str(op_str, version.parse()?)?
            } else {
                Constraint::from_op_str(op_str, version_str.parse()?)?
            };

            constraints.push(constraint);
        }

        Ok(Self { constraints })
    }

    /// Check whether a version satisfies every atom of the conjunction.
    pub fn matches(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.matches(version))
    }

    /// Conjoin two constraints. The result may be unsatisfiable; emptiness
    /// is a property of the version universe it is checked against, not of
    /// the conjunction itself.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut constraints = self.constraints.clone();
        for atom in &other.constraints {
            if !constraints.contains(atom) {
                constraints.push(atom.clone());
            }
        }
        Self { constraints }
    }

    /// The subset of `versions` accepted by this constraint, preserving
    /// input order.
    pub fn satisfying<'a>(&self, versions: &'a [Version]) -> Vec<&'a Version> {
        versions.iter().filter(|v| self.matches(v)).collect()
    }
}

impl From<Constraint> for VersionConstraint {
    fn from(constraint: Constraint) -> Self {
        Self {
            constraints: vec![constraint],
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = ConstraintError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            return f.write_str("*");
        }
        for (i, constraint) in self.constraints.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", constraint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn parse(s: &str) -> VersionConstraint {
        VersionConstraint::parse(s).unwrap()
    }

    #[test]
    fn test_parse_single_atom() {
        let constraint = parse(">= 1.0");
        assert_eq!(constraint.atoms().len(), 1);
        assert!(constraint.matches(&v("1.5.0")));
        assert!(!constraint.matches(&v("0.9.0")));
    }

    #[test]
    fn test_parse_attached_operator() {
        assert_eq!(parse(">=1.0"), parse(">= 1.0"));
        assert_eq!(parse("~>2.1"), parse("~> 2.1"));
        assert_eq!(parse("==1.0"), parse("= 1.0"));
    }

    #[test]
    fn test_parse_bare_version_is_equality() {
        let constraint = parse("1.2.3");
        assert!(constraint.matches(&v("1.2.3")));
        assert!(!constraint.matches(&v("1.2.4")));
    }

    #[test]
    fn test_parse_conjunction() {
        let constraint = parse(">= 1.0 < 2.0");
        assert!(constraint.matches(&v("1.5.0")));
        assert!(!constraint.matches(&v("2.0.0")));
        assert!(!constraint.matches(&v("0.9.0")));
    }

    #[test]
    fn test_parse_wildcard_and_default() {
        assert!(parse("*").is_any());
        assert!(VersionConstraint::any().matches(&v("0.0.1")));
        assert!(VersionConstraint::any().matches(&v("99.99.99")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(VersionConstraint::parse("").is_err());
        assert!(VersionConstraint::parse(">=").is_err());
        assert!(VersionConstraint::parse("^1.0").is_err());
        assert!(VersionConstraint::parse("~> 1").is_err());
        assert!(VersionConstraint::parse(">= banana").is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for input in ["*", "= 1.2.3", ">= 1.0 < 2.0", "~> 1.2"] {
            let constraint = parse(input);
            assert_eq!(constraint.to_string(), input);
            assert_eq!(parse(&constraint.to_string()), constraint);
        }
    }

    #[test]
    fn test_intersect() {
        let lower = parse(">= 1.0");
        let upper = parse("< 2.0");
        let combined = lower.intersect(&upper);
        assert!(combined.matches(&v("1.5.0")));
        assert!(!combined.matches(&v("2.1.0")));

        // intersecting with the default constraint changes nothing
        assert_eq!(lower.intersect(&VersionConstraint::any()), lower);
    }

    #[test]
    fn test_intersect_can_be_unsatisfiable() {
        let combined = parse("= 1.0").intersect(&parse("= 2.0"));
        let versions = [v("1.0"), v("2.0"), v("3.0")];
        assert!(combined.satisfying(&versions).is_empty());
    }

    #[test]
    fn test_satisfying_preserves_order() {
        let versions = [v("1.0"), v("1.5"), v("2.0"), v("2.5")];
        let picked = parse(">= 1.5 < 2.5").satisfying(&versions);
        let rendered: Vec<String> = picked.iter().map(|v| v.to_string()).collect();
        assert_eq!(rendered, ["1.5", "2.0"]);
    }

    #[test]
    fn test_pessimistic_through_parser() {
        let constraint = parse("~> 1.2");
        assert!(constraint.matches(&v("1.3.99")));
        assert!(!constraint.matches(&v("2.0.0")));
    }
}
