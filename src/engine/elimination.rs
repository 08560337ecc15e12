//! Survival probabilities and elimination status for battle-royale leagues.
//!
//! Pure functions over one league's weekly scores. Elimination is folded
//! forward week by week and never reversed.

use crate::domain::{CanonicalTeamId, EliminationStatus, TeamRanking, Week};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

const RANK_WEIGHT: f64 = 1.0;
const PROJECTION_WEIGHT: f64 = 0.3;
const CONSISTENCY_WEIGHT: f64 = 0.2;
const HORIZON_WEIGHT: f64 = 0.2;
const TOTAL_WEIGHT: f64 = RANK_WEIGHT + PROJECTION_WEIGHT + CONSISTENCY_WEIGHT + HORIZON_WEIGHT;

const MIN_SAFETY: f64 = 0.01;
const MAX_SAFETY: f64 = 0.99;

/// League-size dependent elimination rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EliminationRules {
    /// Alive-team count at or above which two teams fall per week.
    pub multi_elimination_threshold: usize,
}

impl Default for EliminationRules {
    fn default() -> Self {
        Self {
            multi_elimination_threshold: 32,
        }
    }
}

impl EliminationRules {
    pub fn eliminations_per_week(&self, alive: usize) -> usize {
        if alive >= self.multi_elimination_threshold {
            2
        } else {
            1
        }
    }
}

/// One team's inputs for a week.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamWeekInput {
    pub team_id: CanonicalTeamId,
    pub score: f64,
    pub projected: f64,
    /// Scores from earlier weeks, used as the consistency signal.
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct EliminationContext {
    pub week: Week,
    pub weeks_remaining: u32,
    /// Teams eliminated before this week, with the week they fell.
    pub prior_eliminated: BTreeMap<CanonicalTeamId, Week>,
    pub rules: EliminationRules,
}

/// Rank by score descending, then team id ascending.
fn rank_order(a_id: &CanonicalTeamId, a: f64, b_id: &CanonicalTeamId, b: f64) -> Ordering {
    b.total_cmp(&a).then_with(|| a_id.cmp(b_id))
}

/// Rankings for one week.
///
/// Alive teams come first in rank order, followed by previously eliminated
/// teams (in the same order) with status `Eliminated` and zero probability.
pub fn calculate_week(inputs: &[TeamWeekInput], ctx: &EliminationContext) -> Vec<TeamRanking> {
    let (mut alive, mut eliminated): (Vec<&TeamWeekInput>, Vec<&TeamWeekInput>) = inputs
        .iter()
        .partition(|t| !ctx.prior_eliminated.contains_key(&t.team_id));
    alive.sort_by(|a, b| rank_order(&a.team_id, a.score, &b.team_id, b.score));
    eliminated.sort_by(|a, b| rank_order(&a.team_id, a.score, &b.team_id, b.score));

    let n = alive.len();
    let k = ctx.rules.eliminations_per_week(n);
    let projected: Vec<f64> = alive.iter().map(|t| t.projected).collect();
    let avg_projected = mean(&projected).unwrap_or(0.0);
    let horizon = 1.0 / (1.0 + ctx.weeks_remaining as f64);

    let mut rankings: Vec<TeamRanking> = alive
        .iter()
        .enumerate()
        .map(|(i, team)| {
            let rank = i + 1;
            let safety = safety(
                rank_percentile(rank, n),
                projection_factor(team.projected, avg_projected),
                consistency(&team.history),
                horizon,
            );
            TeamRanking {
                team_id: team.team_id.clone(),
                week: ctx.week,
                score: team.score,
                rank,
                status: status_for(rank, n, k, safety),
                survival_probability: safety,
                eliminated_week: None,
            }
        })
        .collect();

    let listed: BTreeSet<&CanonicalTeamId> = eliminated.iter().map(|t| &t.team_id).collect();
    let mut out_ranked: Vec<(CanonicalTeamId, f64)> = eliminated
        .iter()
        .map(|t| (t.team_id.clone(), t.score))
        .collect();
    // Teams that fell earlier but no longer appear in the week's inputs.
    out_ranked.extend(
        ctx.prior_eliminated
            .keys()
            .filter(|id| !listed.contains(id))
            .map(|id| (id.clone(), 0.0)),
    );
    out_ranked.sort_by(|(a_id, a), (b_id, b)| rank_order(a_id, *a, b_id, *b));

    rankings.extend(out_ranked.into_iter().enumerate().map(|(i, (team_id, score))| {
        let eliminated_week = ctx.prior_eliminated.get(&team_id).copied();
        TeamRanking {
            team_id,
            week: ctx.week,
            score,
            rank: n + i + 1,
            status: EliminationStatus::Eliminated,
            survival_probability: 0.0,
            eliminated_week,
        }
    }));
    rankings
}

fn safety(rank_pct: f64, projection: f64, consistency: f64, horizon: f64) -> f64 {
    let weighted = RANK_WEIGHT * rank_pct
        + PROJECTION_WEIGHT * projection
        + CONSISTENCY_WEIGHT * consistency
        + HORIZON_WEIGHT * horizon;
    (weighted / TOTAL_WEIGHT).clamp(MIN_SAFETY, MAX_SAFETY)
}

fn rank_percentile(rank: usize, n: usize) -> f64 {
    if n <= 1 {
        return 1.0;
    }
    (n - rank) as f64 / (n - 1) as f64
}

fn projection_factor(projected: f64, avg_projected: f64) -> f64 {
    if avg_projected <= 0.0 {
        return 0.5;
    }
    (projected / avg_projected - 0.5).clamp(0.0, 1.0)
}

fn consistency(history: &[f64]) -> f64 {
    if history.len() < 2 {
        return 0.5;
    }
    let Some(mean) = mean(history).filter(|m| *m > 0.0) else {
        return 0.5;
    };
    let variance = history.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / history.len() as f64;
    (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// First matching threshold wins.
fn status_for(rank: usize, n: usize, k: usize, safety: f64) -> EliminationStatus {
    let rank_f = rank as f64;
    let n_f = n as f64;
    let top_decile = rank_f <= n_f * 0.1;
    let in_zone = n > 1 && rank + k > n;
    let bottom_quartile = rank_f > n_f * 0.75;

    if rank == 1 || (top_decile && safety > 0.8) {
        EliminationStatus::Champion
    } else if in_zone || safety < 0.15 {
        EliminationStatus::Critical
    } else if bottom_quartile || safety < 0.30 {
        EliminationStatus::Danger
    } else if safety < 0.60 {
        EliminationStatus::Warning
    } else {
        EliminationStatus::Safe
    }
}

// =============================================================================
// Season fold
// =============================================================================

/// Folds completed weeks into the set of eliminated teams.
#[derive(Debug, Clone, Default)]
pub struct EliminationTracker {
    rules: EliminationRules,
    eliminated: BTreeMap<CanonicalTeamId, Week>,
}

impl EliminationTracker {
    pub fn new(rules: EliminationRules) -> Self {
        Self {
            rules,
            eliminated: BTreeMap::new(),
        }
    }

    pub fn is_eliminated(&self, team: &CanonicalTeamId) -> bool {
        self.eliminated.contains_key(team)
    }

    pub fn eliminated(&self) -> &BTreeMap<CanonicalTeamId, Week> {
        &self.eliminated
    }

    /// Eliminates the bottom `k` alive teams of a completed week and returns
    /// them. The last team standing is never eliminated.
    pub fn record_final_week(&mut self, week: Week, scores: &[(CanonicalTeamId, f64)]) -> Vec<CanonicalTeamId> {
        // A team listed twice counts once, with its first score.
        let mut seen = BTreeSet::new();
        let mut alive: Vec<&(CanonicalTeamId, f64)> = scores
            .iter()
            .filter(|(id, _)| !self.eliminated.contains_key(id) && seen.insert(id))
            .collect();
        alive.sort_by(|(a_id, a), (b_id, b)| rank_order(a_id, *a, b_id, *b));

        let k = self
            .rules
            .eliminations_per_week(alive.len())
            .min(alive.len().saturating_sub(1));
        let fallen: Vec<CanonicalTeamId> = alive[alive.len() - k..]
            .iter()
            .map(|(id, _)| id.clone())
            .collect();
        for id in &fallen {
            tracing::debug!(team = %id, week, "Team eliminated");
            self.eliminated.insert(id.clone(), week);
        }
        fallen
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamWeekScore {
    pub team_id: CanonicalTeamId,
    pub score: f64,
    pub projected: f64,
}

/// All team scores of one league week.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekScores {
    pub week: Week,
    pub is_final: bool,
    pub teams: Vec<TeamWeekScore>,
}

#[derive(Debug, Clone, Copy)]
pub struct SeasonContext {
    pub final_week: Week,
    pub rules: EliminationRules,
    /// Whether completed weeks eliminate teams (battle-royale leagues).
    pub eliminations: bool,
}

/// Rankings for `target_week`, with elimination history from earlier final
/// weeks and score history from every earlier week.
pub fn season_rankings(weeks: &[WeekScores], target_week: Week, ctx: &SeasonContext) -> Vec<TeamRanking> {
    let mut ordered: Vec<&WeekScores> = weeks.iter().collect();
    ordered.sort_by_key(|w| w.week);

    let mut tracker = EliminationTracker::new(ctx.rules);
    let mut history: BTreeMap<&CanonicalTeamId, Vec<f64>> = BTreeMap::new();
    for week in ordered.iter().filter(|w| w.week < target_week) {
        for team in &week.teams {
            history.entry(&team.team_id).or_default().push(team.score);
        }
        if ctx.eliminations && week.is_final {
            let scores: Vec<(CanonicalTeamId, f64)> = week
                .teams
                .iter()
                .map(|t| (t.team_id.clone(), t.score))
                .collect();
            tracker.record_final_week(week.week, &scores);
        }
    }

    let Some(target) = ordered.iter().find(|w| w.week == target_week) else {
        return Vec::new();
    };
    let inputs: Vec<TeamWeekInput> = target
        .teams
        .iter()
        .map(|t| TeamWeekInput {
            team_id: t.team_id.clone(),
            score: t.score,
            projected: t.projected,
            history: history.get(&t.team_id).cloned().unwrap_or_default(),
        })
        .collect();
    let week_ctx = EliminationContext {
        week: target_week,
        weeks_remaining: ctx.final_week.saturating_sub(target_week),
        prior_eliminated: tracker.eliminated().clone(),
        rules: ctx.rules,
    };
    calculate_week(&inputs, &week_ctx)
}
