//! Version values with a total order.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Malformed version \"{input}\", expected MAJOR[.MINOR[.PATCH]][-PRE][+BUILD]")]
    Malformed { input: String },
}

/// A release version: `major.minor.patch` with optional pre-release and
/// build tags.
///
/// Versions are totally ordered: lexicographically on the numeric triple,
/// with a pre-release sorting strictly below the same triple without one.
/// Build tags never participate in comparison or equality.
#[derive(Debug, Clone)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Option<String>,
    build: Option<String>,
    /// How many numeric components were written in the source text.
    /// Parsing "1.2" and "1.2.0" yields equal versions that render
    /// differently; the pessimistic operator also distinguishes them.
    segments: u8,
}

impl Version {
    /// Create a version from a full numeric triple.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
            build: None,
            segments: 3,
        }
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// The pre-release tag, if any.
    pub fn pre(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    /// The build tag, if any. Ignored by comparisons.
    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    /// Number of numeric components in the written form (1, 2 or 3).
    pub fn segments(&self) -> u8 {
        self.segments
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// The smallest release triple strictly above every version this one's
    /// pessimistic range covers: `1.2` caps at `2.0.0`, `1.2.3` at `1.3.0`.
    ///
    /// Returns `None` for a single-component version, which has no
    /// well-defined pessimistic ceiling.
    pub fn pessimistic_ceiling(&self) -> Option<Version> {
        match self.segments {
            2 => Some(Version::new(self.major + 1, 0, 0)),
            3 => Some(Version::new(self.major, self.minor + 1, 0)),
            _ => None,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        // pre-release identifiers must hash the way they compare:
        // `compare_identifier` treats "01" and "1" as the same number
        match &self.pre {
            None => 0u8.hash(state),
            Some(pre) => {
                1u8.hash(state);
                for identifier in pre.split('.') {
                    match identifier.parse::<u64>() {
                        Ok(numeric) => {
                            0u8.hash(state);
                            numeric.hash(state);
                        }
                        Err(_) => {
                            1u8.hash(state);
                            identifier.hash(state);
                        }
                    }
                }
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segments {
            1 => write!(f, "{}", self.major)?,
            2 => write!(f, "{}.{}", self.major, self.minor)?,
            _ => write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?,
        }
        if let Some(ref pre) = self.pre {
            write!(f, "-{}", pre)?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = || VersionError::Malformed {
            input: input.to_string(),
        };

        let (rest, build) = match input.split_once('+') {
            Some((rest, build)) => {
                if !is_valid_tag(build) {
                    return Err(malformed());
                }
                (rest, Some(build.to_string()))
            }
            None => (input, None),
        };

        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => {
                if !is_valid_tag(pre) {
                    return Err(malformed());
                }
                (core, Some(pre.to_string()))
            }
            None => (rest, None),
        };

        let mut parts = [0u64; 3];
        let mut count = 0usize;
        for piece in core.split('.') {
            if count == 3 || piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            parts[count] = piece.parse().map_err(|_| malformed())?;
            count += 1;
        }
        if count == 0 {
            return Err(malformed());
        }

        Ok(Version {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            pre,
            build,
            segments: count as u8,
        })
    }
}

/// Pre-release and build tags accept ASCII alphanumerics, dots and hyphens.
fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
}

/// Compare two pre-release tags identifier by identifier.
///
/// Identifiers are dot-separated. Numeric identifiers compare numerically
/// and sort below alphanumeric ones; with a common prefix, the shorter tag
/// sorts first.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => {
                let cmp = compare_identifier(x, y);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
        }
    }
}

fn compare_identifier(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
