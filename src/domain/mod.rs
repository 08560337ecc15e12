//! Unified domain model shared by both platform adapters.
//!
//! This module provides:
//! - Domain primitives: PlatformSource, LeagueRef, canonical player/team ids
//! - The static stat dictionary and raw stat records
//! - League metadata, canonical league status and scoring rulesets
//! - Immutable matchup snapshots
//! - Ranking and score breakdown output types

pub mod league;
pub mod matchup;
pub mod primitives;
pub mod ranking;
pub mod stats;

pub use league::{
    BundledScoring, LeagueFormat, LeagueInfo, LeagueStatus, ScoringRuleset, StatusSignals,
    TeamInfo,
};
pub use matchup::{MatchupSnapshot, MatchupStatus, RosterEntry, SnapshotId, TeamSnapshot};
pub use primitives::{
    CanonicalPlayerId, CanonicalTeamId, LeagueId, LeagueRef, PlatformSource, Week,
};
pub use ranking::{
    Confidence, Discrepancy, EliminationStatus, RuleSource, ScoreBreakdown, ScoreBreakdownItem,
    TeamRanking,
};
pub use stats::{RawStatRecord, StatDictionary, StatSource};
