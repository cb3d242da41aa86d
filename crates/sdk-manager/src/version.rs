//! Version ordering
//!
//! SDK versions come in several shapes: plain releases (`4.3`, `4.3.0`),
//! pre-releases (`4.3.0-beta2`, `4.3.0-rc1`, `4.3.0-dp3`) and opaque legacy
//! tags (`tintin`). [`VersionKey`] turns any of them into a totally ordered
//! key.
//!
//! Legacy/unparseable tags sort as version 0.0.0 plus their literal string as
//! a tiebreak: they come after a bare `0.0.0` and before `0.0.1`. Input that
//! starts with a version but carries extra text (`1.2.3.4`, `4.3-gamma`) is
//! keyed by that leading version, with the rest as the tiebreak.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-(dp|dev-preview|beta|rc)(\d*))?")
        .expect("version pattern is valid")
});

/// Build stage of a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    DevPreview,
    Beta,
    ReleaseCandidate,
    Release,
}

impl Stage {
    fn from_suffix(suffix: &str) -> Self {
        match suffix {
            "dp" | "dev-preview" => Stage::DevPreview,
            "beta" => Stage::Beta,
            "rc" => Stage::ReleaseCandidate,
            _ => Stage::Release,
        }
    }
}

/// Totally ordered key for a version string
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionKey {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub stage: Stage,
    pub stage_number: u64,
    /// Text past the leading version; the whole input when none was found
    pub fallback: String,
}

impl VersionKey {
    /// Parse a version string. Never fails.
    pub fn parse(version: &str) -> Self {
        Self::try_parse(version).unwrap_or_else(|| VersionKey {
            major: 0,
            minor: 0,
            patch: 0,
            stage: Stage::Release,
            stage_number: 0,
            fallback: version.to_string(),
        })
    }

    fn try_parse(version: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(version)?;
        let rest = &version[caps.get(0)?.end()..];
        let number = |idx: usize| -> Option<u64> {
            match caps.get(idx) {
                Some(m) if !m.as_str().is_empty() => m.as_str().parse().ok(),
                _ => Some(0),
            }
        };

        Some(VersionKey {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            stage: caps
                .get(4)
                .map(|m| Stage::from_suffix(m.as_str()))
                .unwrap_or(Stage::Release),
            stage_number: number(5)?,
            fallback: rest.to_string(),
        })
    }

    /// Whether part of the input is only compared as text
    pub fn is_fallback(&self) -> bool {
        !self.fallback.is_empty()
    }

    fn is_bare_tag(&self) -> bool {
        (self.major, self.minor, self.patch, self.stage, self.stage_number) == (0, 0, 0, Stage::Release, 0)
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fallback() && self.is_bare_tag() {
            return write!(f, "{}", self.fallback);
        }
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        match self.stage {
            Stage::DevPreview => write!(f, "-dp{}", self.stage_number)?,
            Stage::Beta => write!(f, "-beta{}", self.stage_number)?,
            Stage::ReleaseCandidate => write!(f, "-rc{}", self.stage_number)?,
            Stage::Release => {}
        }
        write!(f, "{}", self.fallback)
    }
}

/// Compare two version strings
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::parse(a).cmp(&VersionKey::parse(b))
}

/// Pick the highest version from a collection
pub fn highest<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    versions
        .into_iter()
        .max_by(|a, b| compare_versions(a, b))
        .map(String::as_str)
}
