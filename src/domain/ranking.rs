//! Ranking and score breakdown output types.

use super::primitives::{CanonicalTeamId, Week};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EliminationStatus {
    Champion,
    Safe,
    Warning,
    Danger,
    Critical,
    Eliminated,
}

impl EliminationStatus {
    pub fn is_alive(&self) -> bool {
        !matches!(self, EliminationStatus::Eliminated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRanking {
    pub team_id: CanonicalTeamId,
    pub week: Week,
    pub score: f64,
    pub rank: usize,
    pub status: EliminationStatus,
    pub survival_probability: f64,
    /// Week in which the team was eliminated, if it has been.
    pub eliminated_week: Option<Week>,
}

/// Which rule source produced a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleSource {
    League,
    BattleRoyaleFormat,
    Legacy,
    ReportedTotal,
    GenericEstimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    High,
    Low,
    EstimateOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdownItem {
    pub stat_key: String,
    pub label: String,
    pub raw_value: f64,
    pub points_per_unit: f64,
    pub total_points: f64,
}

/// Computed total disagrees with what the platform reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub computed: f64,
    pub reported: f64,
    /// `computed - reported`.
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub items: Vec<ScoreBreakdownItem>,
    /// Total to display. Platform-reported whenever the platform reported one.
    pub total: f64,
    /// Total recomputed from a ruleset, when one applied.
    pub computed_total: Option<f64>,
    pub reported_total: Option<f64>,
    /// Informational sum of generic estimate lines. Never authoritative.
    pub estimated_total: Option<f64>,
    pub source: RuleSource,
    pub confidence: Confidence,
    pub discrepancy: Option<Discrepancy>,
}

impl ScoreBreakdown {
    pub fn items_sum(&self) -> f64 {
        self.items.iter().map(|i| i.total_points).sum()
    }
}
