//! Score reconciliation: recompute fantasy points from raw box-score stats.
//!
//! Rules are resolved through a fixed priority chain and the first applicable
//! source wins:
//!
//! 1. the league's own ruleset
//! 2. the bundled table of a battle-royale scoring format
//! 3. a legacy per-platform table
//! 4. the platform-reported total as a single synthetic line
//! 5. a generic estimate, shown for context but never used as the total
//!
//! The platform-reported total is always what gets displayed when present.
//! A recomputed total that disagrees is surfaced as a [`Discrepancy`].

use crate::domain::{
    BundledScoring, Confidence, Discrepancy, PlatformSource, RawStatRecord, RuleSource,
    ScoreBreakdown, ScoreBreakdownItem, ScoringRuleset, StatDictionary,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Largest absolute difference between computed and reported totals that is
/// still considered a match.
pub const DISCREPANCY_EPSILON: f64 = 0.01;

pub const FANTASY_POINTS_KEY: &str = "fantasy_points";
pub const FANTASY_POINTS_LABEL: &str = "Fantasy Points Earned";

/// Everything the fallback chain may draw rules from.
#[derive(Debug, Clone, Default)]
pub struct ScoringInputs<'a> {
    pub league_ruleset: Option<&'a ScoringRuleset>,
    /// Set when the league is a battle-royale with a known bundled format.
    pub battle_royale: Option<BundledScoring>,
    pub legacy: Option<&'a ScoringRuleset>,
}

/// Compute a player's score breakdown.
pub fn compute_breakdown(
    raw: &RawStatRecord,
    inputs: &ScoringInputs<'_>,
    reported_total: Option<f64>,
) -> ScoreBreakdown {
    let stats = raw.canonical_stats();

    let bundled = inputs.battle_royale.map(bundled_ruleset);
    let chosen = inputs
        .league_ruleset
        .filter(|r| !r.is_empty())
        .map(|r| (r, RuleSource::League, Confidence::High))
        .or_else(|| {
            bundled
                .as_ref()
                .map(|r| (r, RuleSource::BattleRoyaleFormat, Confidence::High))
        })
        .or_else(|| {
            inputs
                .legacy
                .filter(|r| !r.is_empty())
                .map(|r| (r, RuleSource::Legacy, Confidence::Low))
        });

    if let Some((rules, source, confidence)) = chosen {
        let items = apply_ruleset(&stats, rules);
        let computed: f64 = items.iter().map(|i| i.total_points).sum();
        let discrepancy = reported_total.and_then(|reported| {
            let delta = computed - reported;
            (delta.abs() > DISCREPANCY_EPSILON).then(|| {
                debug!(
                    player = %raw.player,
                    week = raw.week,
                    computed,
                    reported,
                    delta,
                    "Computed score disagrees with platform total"
                );
                Discrepancy {
                    computed,
                    reported,
                    delta,
                }
            })
        });
        return ScoreBreakdown {
            items,
            total: reported_total.unwrap_or(computed),
            computed_total: Some(computed),
            reported_total,
            estimated_total: None,
            source,
            confidence,
            discrepancy,
        };
    }

    if let Some(reported) = reported_total {
        return ScoreBreakdown {
            items: vec![ScoreBreakdownItem {
                stat_key: FANTASY_POINTS_KEY.to_string(),
                label: FANTASY_POINTS_LABEL.to_string(),
                raw_value: reported,
                points_per_unit: 1.0,
                total_points: reported,
            }],
            total: reported,
            computed_total: None,
            reported_total,
            estimated_total: None,
            source: RuleSource::ReportedTotal,
            confidence: Confidence::EstimateOnly,
            discrepancy: None,
        };
    }

    let items = apply_ruleset(&stats, &generic_estimate_ruleset());
    let estimate: f64 = items.iter().map(|i| i.total_points).sum();
    ScoreBreakdown {
        items,
        total: 0.0,
        computed_total: None,
        reported_total: None,
        estimated_total: Some(estimate),
        source: RuleSource::GenericEstimate,
        confidence: Confidence::EstimateOnly,
        discrepancy: None,
    }
}

/// Σ raw * ppu over the ruleset's keys; lines only for non-zero raw values,
/// sorted by descending |points| then stat key.
fn apply_ruleset(stats: &BTreeMap<&'static str, f64>, rules: &ScoringRuleset) -> Vec<ScoreBreakdownItem> {
    let mut items: Vec<ScoreBreakdownItem> = rules
        .iter()
        .filter_map(|(key, ppu)| {
            let raw = stats.get(key.as_str()).copied().unwrap_or(0.0);
            (raw != 0.0).then(|| ScoreBreakdownItem {
                stat_key: key.clone(),
                label: StatDictionary::label(key).to_string(),
                raw_value: raw,
                points_per_unit: *ppu,
                total_points: raw * ppu,
            })
        })
        .collect();
    sort_items(&mut items);
    items
}

pub fn sort_items(items: &mut [ScoreBreakdownItem]) {
    items.sort_by(|a, b| {
        b.total_points
            .abs()
            .total_cmp(&a.total_points.abs())
            .then_with(|| a.stat_key.cmp(&b.stat_key))
    });
}

// =============================================================================
// Bundled tables
// =============================================================================

const STANDARD_TABLE: &[(&str, f64)] = &[
    ("pass_yd", 0.04),
    ("pass_td", 4.0),
    ("pass_int", -2.0),
    ("pass_2pt", 2.0),
    ("rush_yd", 0.1),
    ("rush_td", 6.0),
    ("rush_2pt", 2.0),
    ("rec_yd", 0.1),
    ("rec_td", 6.0),
    ("rec_2pt", 2.0),
    ("fum_lost", -2.0),
    ("fgm_0_19", 3.0),
    ("fgm_20_29", 3.0),
    ("fgm_30_39", 3.0),
    ("fgm_0_39", 3.0),
    ("fgm_40_49", 4.0),
    ("fgm_50p", 5.0),
    ("fgmiss", -1.0),
    ("xpm", 1.0),
    ("xpmiss", -1.0),
    ("def_td", 6.0),
    ("def_int", 2.0),
    ("def_fum_rec", 2.0),
    ("def_sack", 1.0),
    ("def_safety", 2.0),
];

/// Scoring table of a bundled battle-royale format.
pub fn bundled_ruleset(format: BundledScoring) -> ScoringRuleset {
    let mut rules = ScoringRuleset::from_table(STANDARD_TABLE);
    let per_reception = match format {
        BundledScoring::Standard => None,
        BundledScoring::HalfPpr => Some(0.5),
        BundledScoring::FullPpr => Some(1.0),
    };
    if let Some(ppr) = per_reception {
        rules.0.insert("rec".to_string(), ppr);
    }
    rules
}

/// Older per-platform defaults, used only when the caller opts in.
pub fn legacy_ruleset(platform: PlatformSource) -> ScoringRuleset {
    let mut rules = ScoringRuleset::from_table(STANDARD_TABLE);
    match platform {
        // Platform A's historical default awarded 6 per passing TD and no
        // points for two-point conversions.
        PlatformSource::A => {
            rules.0.insert("pass_td".to_string(), 6.0);
            for key in ["pass_2pt", "rush_2pt", "rec_2pt"] {
                rules.0.remove(key);
            }
        }
        PlatformSource::B => {
            rules.0.insert("rec".to_string(), 0.5);
        }
    }
    rules
}

/// Display-only estimate table.
pub fn generic_estimate_ruleset() -> ScoringRuleset {
    bundled_ruleset(BundledScoring::Standard)
}
