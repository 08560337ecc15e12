//! League metadata, canonical league status and scoring rulesets.

use super::primitives::{CanonicalTeamId, LeagueId, PlatformSource, Week};
use super::stats::StatDictionary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Canonical league lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeagueStatus {
    PreDraft,
    Drafting,
    InSeason,
    Complete,
}

/// Raw status signals collected from a platform payload.
///
/// Platforms report several overlapping flags; [`StatusSignals::resolve`]
/// applies a fixed priority so disagreeing flags always yield the same status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSignals {
    pub draft_in_progress: bool,
    pub complete: bool,
    pub active: bool,
}

impl StatusSignals {
    /// Priority: draft in progress > complete > active > pre-draft.
    pub fn resolve(&self) -> LeagueStatus {
        if self.draft_in_progress {
            LeagueStatus::Drafting
        } else if self.complete {
            LeagueStatus::Complete
        } else if self.active {
            LeagueStatus::InSeason
        } else {
            LeagueStatus::PreDraft
        }
    }
}

/// Bundled scoring tables for battle-royale leagues with custom scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundledScoring {
    Standard,
    HalfPpr,
    FullPpr,
}

impl FromStr for BundledScoring {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "std" => Ok(BundledScoring::Standard),
            "half_ppr" | "half" => Ok(BundledScoring::HalfPpr),
            "full_ppr" | "ppr" => Ok(BundledScoring::FullPpr),
            other => Err(format!("unknown scoring format: {}", other)),
        }
    }
}

/// League format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LeagueFormat {
    HeadToHead,
    /// Lowest score each week is eliminated.
    BattleRoyale { bundled: Option<BundledScoring> },
}

impl LeagueFormat {
    pub fn is_battle_royale(&self) -> bool {
        matches!(self, LeagueFormat::BattleRoyale { .. })
    }
}

/// Canonical stat key -> points per unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringRuleset(pub BTreeMap<String, f64>);

impl ScoringRuleset {
    pub fn new(rules: BTreeMap<String, f64>) -> Self {
        ScoringRuleset(rules)
    }

    /// Build from a static `(key, points)` table.
    pub fn from_table(table: &[(&str, f64)]) -> Self {
        ScoringRuleset(
            table
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        )
    }

    /// Translate platform-native rule keys into canonical keys. Keys the
    /// dictionary does not know are dropped.
    pub fn from_native(source: PlatformSource, native: &BTreeMap<String, f64>) -> Self {
        ScoringRuleset(
            native
                .iter()
                .filter_map(|(native_key, points)| {
                    StatDictionary::canonical_key(source, native_key).map(|key| (key.to_string(), *points))
                })
                .collect(),
        )
    }

    pub fn points_per_unit(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

/// A fantasy team as listed in league metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfo {
    pub id: CanonicalTeamId,
    pub name: String,
    pub owner: String,
}

/// Normalized league metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueInfo {
    pub league_id: LeagueId,
    pub platform: PlatformSource,
    pub name: String,
    pub status: LeagueStatus,
    pub season: u32,
    pub current_week: Week,
    pub final_week: Week,
    pub team_count: usize,
    pub format: LeagueFormat,
    pub scoring: Option<ScoringRuleset>,
    pub teams: Vec<TeamInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_flag_wins_over_active() {
        let signals = StatusSignals {
            draft_in_progress: true,
            complete: false,
            active: true,
        };
        assert_eq!(signals.resolve(), LeagueStatus::Drafting);
    }

    #[test]
    fn test_complete_wins_over_active() {
        let signals = StatusSignals {
            draft_in_progress: false,
            complete: true,
            active: true,
        };
        assert_eq!(signals.resolve(), LeagueStatus::Complete);
    }

    #[test]
    fn test_no_signals_is_pre_draft() {
        assert_eq!(StatusSignals::default().resolve(), LeagueStatus::PreDraft);
    }

    #[test]
    fn test_ruleset_from_native_platform_a() {
        let mut native = BTreeMap::new();
        native.insert("53".to_string(), 1.0);
        native.insert("42".to_string(), 0.1);
        native.insert("1234".to_string(), 5.0);
        let rules = ScoringRuleset::from_native(PlatformSource::A, &native);
        assert_eq!(rules.points_per_unit("rec"), Some(1.0));
        assert_eq!(rules.points_per_unit("rec_yd"), Some(0.1));
        assert_eq!(rules.0.len(), 2);
    }

    #[test]
    fn test_bundled_scoring_from_str() {
        assert_eq!(BundledScoring::from_str("half_ppr").unwrap(), BundledScoring::HalfPpr);
        assert_eq!(BundledScoring::from_str("PPR").unwrap(), BundledScoring::FullPpr);
        assert!(BundledScoring::from_str("x").is_err());
    }
}
