//! Domain primitives: PlatformSource, LeagueId, LeagueRef, canonical ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scoring period number (1-based week of the season).
pub type Week = u32;

/// The fantasy platform a record originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformSource {
    /// Platform A (numeric stat ids, home/away schedule payloads).
    A,
    /// Platform B (string stat keys, roster-keyed matchup payloads).
    B,
}

impl PlatformSource {
    /// Namespace prefix used for pass-through canonical ids.
    pub fn namespace(&self) -> &'static str {
        match self {
            PlatformSource::A => "a",
            PlatformSource::B => "b",
        }
    }

    pub fn all() -> [PlatformSource; 2] {
        [PlatformSource::A, PlatformSource::B]
    }
}

impl fmt::Display for PlatformSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.namespace())
    }
}

impl FromStr for PlatformSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(PlatformSource::A),
            "b" => Ok(PlatformSource::B),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Platform-native league identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LeagueId(pub String);

impl LeagueId {
    pub fn new(id: impl Into<String>) -> Self {
        LeagueId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeagueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A league on a specific platform. Key of every per-league registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueRef {
    pub platform: PlatformSource,
    pub league_id: LeagueId,
}

impl LeagueRef {
    pub fn new(platform: PlatformSource, league_id: impl Into<String>) -> Self {
        Self {
            platform,
            league_id: LeagueId::new(league_id),
        }
    }
}

impl fmt::Display for LeagueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.league_id)
    }
}

impl FromStr for LeagueRef {
    type Err = String;

    /// Parses `"a:12345"` style references.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (platform, id) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected <platform>:<league_id>, got {}", s))?;
        let platform = PlatformSource::from_str(platform)?;
        let id = id.trim();
        if id.is_empty() {
            return Err(format!("empty league id in {}", s));
        }
        Ok(LeagueRef::new(platform, id))
    }
}

/// Player identifier shared across platforms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalPlayerId(pub String);

impl CanonicalPlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        CanonicalPlayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team identifier shared across platforms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalTeamId(pub String);

impl CanonicalTeamId {
    pub fn new(id: impl Into<String>) -> Self {
        CanonicalTeamId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalTeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
