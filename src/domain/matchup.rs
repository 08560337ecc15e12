//! Normalized matchup snapshots: the unit of caching.

use super::primitives::{CanonicalPlayerId, CanonicalTeamId, LeagueId, PlatformSource, Week};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one matchup snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotId {
    pub league_id: LeagueId,
    pub matchup_id: String,
    pub platform: PlatformSource,
    pub week: Week,
}

impl SnapshotId {
    pub fn new(
        platform: PlatformSource,
        league_id: LeagueId,
        matchup_id: impl Into<String>,
        week: Week,
    ) -> Self {
        Self {
            league_id,
            matchup_id: matchup_id.into(),
            platform,
            week,
        }
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/w{}/{}",
            self.platform, self.league_id, self.week, self.matchup_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchupStatus {
    Scheduled,
    Live,
    Final,
}

/// One rostered player within a team snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub player: CanonicalPlayerId,
    pub is_starter: bool,
    pub lineup_slot: String,
    /// Points the platform itself credits this player with, if reported.
    pub reported_points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSnapshot {
    pub team_id: CanonicalTeamId,
    pub name: String,
    pub owner: String,
    pub score: f64,
    pub projected_score: f64,
    pub roster: Vec<RosterEntry>,
}

impl TeamSnapshot {
    pub fn starters(&self) -> impl Iterator<Item = &RosterEntry> {
        self.roster.iter().filter(|e| e.is_starter)
    }

    pub fn entry(&self, player: &CanonicalPlayerId) -> Option<&RosterEntry> {
        self.roster.iter().find(|e| &e.player == player)
    }
}

/// Immutable view of one matchup at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchupSnapshot {
    pub id: SnapshotId,
    pub home: TeamSnapshot,
    pub away: TeamSnapshot,
    pub status: MatchupStatus,
    pub fetched_at: DateTime<Utc>,
}

impl MatchupSnapshot {
    pub fn teams(&self) -> [&TeamSnapshot; 2] {
        [&self.home, &self.away]
    }

    pub fn is_live(&self) -> bool {
        self.status == MatchupStatus::Live
    }

    /// The team rostering `player`, if either side does.
    pub fn team_of(&self, player: &CanonicalPlayerId) -> Option<&TeamSnapshot> {
        self.teams().into_iter().find(|t| t.entry(player).is_some())
    }
}
