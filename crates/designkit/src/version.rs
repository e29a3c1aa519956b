//! # Version Comparison
//!
//! Artifacts record the model format they were written with as a dotted
//! version string (`"1.7.25"`, `"2.0"`, `"2.1-SNAPSHOT"`). Two questions hinge on
//! ordering those strings:
//!
//! - Does a migration apply? (its target is greater than the artifact version)
//! - Is the artifact usable by this build? (artifact version ≤ model version)
//!
//! ## Parsing Rules
//!
//! - Components are split on `.` and only their leading digits count:
//!   `"2.0-SNAPSHOT"` parses as `[2, 0]`.
//! - A component without leading digits counts as `0`.
//! - Missing trailing components are zero, so `"2"`, `"2.0"` and `"2.0.0"` are equal.
//!
//! Parsing never fails. Comparison is a total order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    parts: Vec<u64>,
}

impl Version {
    pub fn parse(raw: &str) -> Self {
        let parts = raw
            .trim()
            .split('.')
            .map(|component| {
                let digits: String = component
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse::<u64>().unwrap_or(0)
            })
            .collect();
        Self {
            raw: raw.trim().to_string(),
            parts,
        }
    }

    /// The version of an artifact that was never migrated.
    pub fn zero() -> Self {
        Self::parse("0")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_greater_than(&self, other: &str) -> bool {
        *self > Version::parse(other)
    }

    pub fn is_greater_or_equal_than(&self, other: &str) -> bool {
        *self >= Version::parse(other)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let left = self.parts.get(i).copied().unwrap_or(0);
            let right = other.parts.get(i).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Version::parse(s))
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
