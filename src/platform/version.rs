//! Dotted platform version identifiers and their ordering weight.
//!
//! A version has 1 to 4 numeric components of at most 4 digits each. Missing
//! trailing components are zero (`8.3` is `8.3.0.0`). The empty string (or
//! `latest`) names the newest installed version and outranks every concrete
//! version.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::Serialize;

use crate::error::{DesignerError, Result};

const MAX_COMPONENTS: usize = 4;
const MAX_COMPONENT_DIGITS: usize = 4;
const WEIGHT_BASE: u64 = 1000;

/// Weight of [`PlatformVersion::Latest`]. Larger than the weight of
/// `9999.9999.9999.9999`.
pub const LATEST_WEIGHT: u64 = u64::MAX;

/// A platform version, or the "latest installed" sentinel.
///
/// Equality and ordering are defined by [`PlatformVersion::weight`] alone.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(into = "String")]
pub enum PlatformVersion {
    /// Newest installed version; parsed from `""` or `"latest"`.
    Latest,
    /// A concrete version, zero-padded to four components.
    Release([u16; MAX_COMPONENTS]),
}

impl PlatformVersion {
    pub fn is_latest(&self) -> bool {
        matches!(self, PlatformVersion::Latest)
    }

    /// The four padded components, or `None` for `Latest`.
    pub fn components(&self) -> Option<[u16; MAX_COMPONENTS]> {
        match self {
            PlatformVersion::Latest => None,
            PlatformVersion::Release(components) => Some(*components),
        }
    }

    /// Ordering weight: component `i` counted from the right contributes
    /// `value * 1000^i`. `8.3.14.1232` weighs `8_003_015_232`.
    pub fn weight(&self) -> u64 {
        match self {
            PlatformVersion::Latest => LATEST_WEIGHT,
            PlatformVersion::Release(components) => components
                .iter()
                .fold(0, |acc, &value| acc * WEIGHT_BASE + u64::from(value)),
        }
    }

    /// True when both are concrete and their padded forms are identical.
    ///
    /// Stricter than `==`: weights can collide for components above 999
    /// (`0.0.1.0` and `0.0.0.1000`), padded strings cannot.
    pub fn same_release(&self, other: &PlatformVersion) -> bool {
        match (self.components(), other.components()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Weight of a version string. `""` is the latest sentinel.
pub fn compute_weight(version: &str) -> Result<u64> {
    Ok(version.parse::<PlatformVersion>()?.weight())
}

fn invalid(version: &str, reason: String) -> DesignerError {
    DesignerError::InvalidVersionFormat(version.to_string(), reason)
}

impl FromStr for PlatformVersion {
    type Err = DesignerError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.eq_ignore_ascii_case("latest") {
            return Ok(PlatformVersion::Latest);
        }

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > MAX_COMPONENTS {
            return Err(invalid(
                s,
                format!(
                    "expected at most {} components, got {}",
                    MAX_COMPONENTS,
                    parts.len()
                ),
            ));
        }

        let mut components = [0u16; MAX_COMPONENTS];
        for (slot, part) in components.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(s, format!("component '{}' is not numeric", part)));
            }
            if part.len() > MAX_COMPONENT_DIGITS {
                return Err(invalid(
                    s,
                    format!(
                        "component '{}' is longer than {} digits",
                        part, MAX_COMPONENT_DIGITS
                    ),
                ));
            }
            *slot = part
                .parse()
                .map_err(|e| invalid(s, format!("component '{}': {}", part, e)))?;
        }

        Ok(PlatformVersion::Release(components))
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformVersion::Latest => write!(f, "latest"),
            PlatformVersion::Release([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
        }
    }
}

impl From<PlatformVersion> for String {
    fn from(version: PlatformVersion) -> Self {
        version.to_string()
    }
}

impl PartialEq for PlatformVersion {
    fn eq(&self, other: &Self) -> bool {
        self.weight() == other.weight()
    }
}

impl Eq for PlatformVersion {}

impl Hash for PlatformVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.weight().hash(state);
    }
}

impl PartialOrd for PlatformVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PlatformVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight().cmp(&other.weight())
    }
}
