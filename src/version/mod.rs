// src/version/mod.rs

//! Version ordering and constraint matching for cookbook versions
//!
//! Cookbook versions are dot-separated non-negative integers ("1.2", "1.2.3").
//! Comparison is component-wise with missing trailing components treated as 0,
//! so "1.2" == "1.2.0". A component that is not a number is an error: guessing
//! a value here could select the wrong artifact.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed cookbook version
#[derive(Debug, Clone)]
pub struct CookbookVersion {
    components: Vec<u64>,
    raw: String,
}

impl CookbookVersion {
    /// Parse a version string such as "1.10.0"
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::malformed_version(s, "empty version"));
        }

        let components = s
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::malformed_version(
                        s,
                        format!("component '{}' is not numeric", part),
                    ));
                }
                part.parse::<u64>().map_err(|e| {
                    Error::malformed_version(s, format!("component '{}': {}", part, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            components,
            raw: s.to_string(),
        })
    }

    /// Numeric components in order
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// The string this version was parsed from
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Exclusive upper bound for the pessimistic operator
    ///
    /// "~> 1.2.3" allows up to (not including) 1.3, "~> 1.2" up to 2.
    fn pessimistic_ceiling(&self) -> CookbookVersion {
        let mut ceiling: Vec<u64> = if self.components.len() > 1 {
            self.components[..self.components.len() - 1].to_vec()
        } else {
            self.components.clone()
        };
        if let Some(last) = ceiling.last_mut() {
            *last = last.saturating_add(1);
        }
        let raw = ceiling
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".");
        CookbookVersion {
            components: ceiling,
            raw,
        }
    }
}

impl FromStr for CookbookVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CookbookVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Ord for CookbookVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for CookbookVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CookbookVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CookbookVersion {}

/// Compare two version strings numerically
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    Ok(CookbookVersion::parse(a)?.cmp(&CookbookVersion::parse(b)?))
}

/// Sort version strings in ascending numeric order
///
/// Every entry is parsed before anything is reordered, so a malformed
/// version leaves the input untouched.
pub fn sort_versions<S: AsRef<str>>(versions: &mut [S]) -> Result<()> {
    for version in versions.iter() {
        CookbookVersion::parse(version.as_ref())?;
    }
    versions.sort_by_cached_key(|v| CookbookVersion::parse(v.as_ref()).ok());
    Ok(())
}

/// Version constraint operators understood by Supermarket dependency lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    /// Exact version match
    Exact(CookbookVersion),
    /// Not equal
    NotEqual(CookbookVersion),
    /// Greater than
    GreaterThan(CookbookVersion),
    /// Greater than or equal
    GreaterOrEqual(CookbookVersion),
    /// Less than
    LessThan(CookbookVersion),
    /// Less than or equal
    LessOrEqual(CookbookVersion),
    /// Compatible with ("~>"): at least this version, below the next
    /// increment of the second-to-last component
    Pessimistic(CookbookVersion),
    /// Both constraints must be satisfied (">= 1.0, < 2.0")
    And(Box<VersionConstraint>, Box<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a constraint string
    ///
    /// Examples:
    /// - ">= 1.2.0" → GreaterOrEqual(1.2.0)
    /// - "~> 2.1" → Pessimistic(2.1)
    /// - "1.0.0" → Exact(1.0.0)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }

        if s.contains(',') {
            let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
            if parts.len() != 2 {
                return Err(Error::InvalidConstraint {
                    constraint: s.to_string(),
                    reason: "only two comma-separated clauses are supported".to_string(),
                });
            }
            let left = Self::parse(parts[0])?;
            let right = Self::parse(parts[1])?;
            return Ok(VersionConstraint::And(Box::new(left), Box::new(right)));
        }

        let version = |rest: &str| {
            CookbookVersion::parse(rest.trim()).map_err(|e| Error::InvalidConstraint {
                constraint: s.to_string(),
                reason: e.to_string(),
            })
        };

        // Two-character operators first so ">=" is not read as ">"
        if let Some(rest) = s.strip_prefix("~>") {
            Ok(VersionConstraint::Pessimistic(version(rest)?))
        } else if let Some(rest) = s.strip_prefix(">=") {
            Ok(VersionConstraint::GreaterOrEqual(version(rest)?))
        } else if let Some(rest) = s.strip_prefix("<=") {
            Ok(VersionConstraint::LessOrEqual(version(rest)?))
        } else if let Some(rest) = s.strip_prefix("!=") {
            Ok(VersionConstraint::NotEqual(version(rest)?))
        } else if let Some(rest) = s.strip_prefix('>') {
            Ok(VersionConstraint::GreaterThan(version(rest)?))
        } else if let Some(rest) = s.strip_prefix('<') {
            Ok(VersionConstraint::LessThan(version(rest)?))
        } else if let Some(rest) = s.strip_prefix('=') {
            Ok(VersionConstraint::Exact(version(rest)?))
        } else {
            Ok(VersionConstraint::Exact(version(s)?))
        }
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &CookbookVersion) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::NotEqual(v) => version != v,
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::LessOrEqual(v) => version <= v,
            VersionConstraint::Pessimistic(v) => {
                version >= v && *version < v.pessimistic_ceiling()
            }
            VersionConstraint::And(left, right) => {
                left.satisfies(version) && right.satisfies(version)
            }
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Exact(v) => write!(f, "= {}", v),
            VersionConstraint::NotEqual(v) => write!(f, "!= {}", v),
            VersionConstraint::GreaterThan(v) => write!(f, "> {}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">= {}", v),
            VersionConstraint::LessThan(v) => write!(f, "< {}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<= {}", v),
            VersionConstraint::Pessimistic(v) => write!(f, "~> {}", v),
            VersionConstraint::And(left, right) => write!(f, "{}, {}", left, right),
        }
    }
}

/// Check a constraint string against a version string
pub fn constraint_matches(constraint: &str, version: &str) -> Result<bool> {
    let constraint = VersionConstraint::parse(constraint)?;
    Ok(constraint.satisfies(&CookbookVersion::parse(version)?))
}

/// Pick the highest candidate satisfying `constraint`
///
/// Candidates may be in any order. Returns `None` when nothing matches.
pub fn select_latest_matching<'a, S: AsRef<str>>(
    constraint: &VersionConstraint,
    candidates: &'a [S],
) -> Result<Option<&'a str>> {
    let mut best: Option<(CookbookVersion, &'a str)> = None;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let parsed = CookbookVersion::parse(candidate)?;
        if !constraint.satisfies(&parsed) {
            continue;
        }
        if best.as_ref().is_none_or(|(current, _)| parsed > *current) {
            best = Some((parsed, candidate));
        }
    }
    Ok(best.map(|(_, raw)| raw))
}
