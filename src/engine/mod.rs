//! Pure computation engines: score reconciliation and elimination odds.
//!
//! Nothing here performs I/O or holds shared state, so both engines are safe
//! to call concurrently from any number of callers.

pub mod elimination;
pub mod scoring;

pub use elimination::{
    calculate_week, season_rankings, EliminationContext, EliminationRules, EliminationTracker,
    SeasonContext, TeamWeekInput, TeamWeekScore, WeekScores,
};
pub use scoring::{
    bundled_ruleset, compute_breakdown, generic_estimate_ruleset, legacy_ruleset, ScoringInputs,
    DISCREPANCY_EPSILON,
};
