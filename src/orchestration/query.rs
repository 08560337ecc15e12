//! Consumer-facing queries over the store and the pure engines.

use crate::domain::{
    CanonicalPlayerId, CanonicalTeamId, LeagueFormat, LeagueInfo, LeagueRef, MatchupSnapshot,
    PlatformSource, RawStatRecord, ScoreBreakdown, ScoringRuleset, SnapshotId, StatSource,
    TeamRanking, Week,
};
use crate::engine::{
    compute_breakdown, season_rankings, EliminationRules, ScoringInputs, SeasonContext,
    TeamWeekScore, WeekScores,
};
use crate::identity::IdentityMapper;
use crate::store::{MatchupStore, RefreshEvent, StoreError, StoreRead, WeekSlate};
use futures::future::try_join_all;
use futures::stream::{self, Stream};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// A player's breakdown together with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerBreakdown {
    pub player: CanonicalPlayerId,
    pub team_id: CanonicalTeamId,
    pub matchup_id: String,
    pub week: Week,
    pub is_starter: bool,
    pub breakdown: ScoreBreakdown,
}

#[derive(Clone)]
pub struct LeagueQueries {
    store: MatchupStore,
    identity: Arc<IdentityMapper>,
    legacy: HashMap<PlatformSource, ScoringRuleset>,
    rules: EliminationRules,
    live_staleness: Duration,
}

impl LeagueQueries {
    pub fn new(store: MatchupStore, identity: Arc<IdentityMapper>) -> Self {
        Self {
            store,
            identity,
            legacy: HashMap::new(),
            rules: EliminationRules::default(),
            live_staleness: Duration::from_secs(30),
        }
    }

    /// Opt a platform into a legacy scoring table.
    pub fn with_legacy_table(mut self, platform: PlatformSource, rules: ScoringRuleset) -> Self {
        self.legacy.insert(platform, rules);
        self
    }

    pub fn with_elimination_rules(mut self, rules: EliminationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Staleness bound applied while the cached week has a live game.
    pub fn with_live_staleness(mut self, staleness: Duration) -> Self {
        self.live_staleness = staleness;
        self
    }

    pub fn store(&self) -> &MatchupStore {
        &self.store
    }

    /// Live weeks get the short bound, everything else the store TTL.
    fn staleness_for(&self, league: &LeagueRef, week: Week) -> Duration {
        match self.store.peek_matchups(league, week) {
            Some(slate) if slate.any_live() => self.live_staleness,
            _ => self.store.config().ttl,
        }
    }

    pub async fn get_matchups(
        &self,
        league: &LeagueRef,
        week: Week,
    ) -> Result<StoreRead<Arc<WeekSlate>>, StoreError> {
        self.store
            .get_matchups(league, week, self.staleness_for(league, week))
            .await
    }

    pub async fn get_matchup(
        &self,
        league: &LeagueRef,
        week: Week,
        matchup_id: &str,
    ) -> Result<StoreRead<MatchupSnapshot>, StoreError> {
        let id = SnapshotId::new(league.platform, league.league_id.clone(), matchup_id, week);
        self.store.get(&id, self.staleness_for(league, week)).await
    }

    /// League metadata; a failure here degrades scoring rather than failing.
    async fn league_info(&self, league: &LeagueRef) -> Option<Arc<LeagueInfo>> {
        match self.store.get_league(league, self.store.config().ttl).await {
            Ok(read) => Some(read.value),
            Err(e) => {
                warn!(league = %league, error = %e, "League info unavailable");
                None
            }
        }
    }

    /// Score breakdown for one player in one matchup. `player` may be a
    /// canonical id or the league platform's native id.
    pub async fn get_breakdown(
        &self,
        league: &LeagueRef,
        week: Week,
        matchup_id: &str,
        player: &str,
    ) -> Result<StoreRead<PlayerBreakdown>, StoreError> {
        let matchup = self.get_matchup(league, week, matchup_id).await?;
        let canonical = self.locate_player(&matchup.value, league.platform, player)?;
        let Some(team) = matchup.value.team_of(&canonical) else {
            return Err(StoreError::NotFound(format!("player {} in matchup {}", player, matchup_id)));
        };
        let entry = team.entry(&canonical);
        let reported = entry.and_then(|e| e.reported_points);

        let staleness = self.staleness_for(league, week);
        let box_score = self
            .store
            .get_box_score(league, matchup_id, week, staleness)
            .await?;
        let raw = box_score
            .value
            .iter()
            .find(|r| r.player == canonical)
            .cloned()
            .unwrap_or_else(|| {
                debug!(player = %canonical, "No stat line, scoring empty record");
                let source = if matchup.value.is_live() {
                    StatSource::Live
                } else {
                    StatSource::Final
                };
                RawStatRecord::new(canonical.clone(), league.platform, week, source, BTreeMap::new())
            });

        let info = self.league_info(league).await;
        let bundled = info.as_ref().and_then(|i| match i.format {
            LeagueFormat::BattleRoyale { bundled } => bundled,
            LeagueFormat::HeadToHead => None,
        });
        let inputs = ScoringInputs {
            league_ruleset: info.as_ref().and_then(|i| i.scoring.as_ref()),
            battle_royale: bundled,
            legacy: self.legacy.get(&league.platform),
        };
        let breakdown = compute_breakdown(&raw, &inputs, reported);

        let result = PlayerBreakdown {
            player: canonical.clone(),
            team_id: team.team_id.clone(),
            matchup_id: matchup_id.to_string(),
            week,
            is_starter: entry.is_some_and(|e| e.is_starter),
            breakdown,
        };
        Ok(StoreRead {
            value: result,
            fetched_at: matchup.fetched_at.min(box_score.fetched_at),
            stale: matchup.stale || box_score.stale,
            error: matchup.error.or(box_score.error),
        })
    }

    fn locate_player(
        &self,
        matchup: &MatchupSnapshot,
        platform: PlatformSource,
        player: &str,
    ) -> Result<CanonicalPlayerId, StoreError> {
        let direct = CanonicalPlayerId::new(player);
        if matchup.team_of(&direct).is_some() {
            return Ok(direct);
        }
        let resolved = self.identity.resolve(player, platform);
        if matchup.team_of(&resolved).is_some() {
            return Ok(resolved);
        }
        Err(StoreError::NotFound(format!("player {} in matchup {}", player, matchup.id)))
    }

    /// Rankings for a week, folding elimination history from every earlier
    /// completed week of the season.
    pub async fn get_rankings(
        &self,
        league: &LeagueRef,
        week: Week,
    ) -> Result<StoreRead<Vec<TeamRanking>>, StoreError> {
        let info = self
            .store
            .get_league(league, self.store.config().ttl)
            .await?;
        let final_week = info.value.final_week;
        if week > final_week {
            return Err(StoreError::WeekOutOfRange { week, final_week });
        }
        let weeks = try_join_all((1..=week.max(1)).map(|w| self.get_matchups(league, w))).await?;

        let mut stale = info.stale;
        let mut error = info.error.clone();
        let mut scores = Vec::with_capacity(weeks.len());
        for read in &weeks {
            stale |= read.stale;
            if error.is_none() {
                error = read.error.clone();
            }
            scores.push(week_scores(&read.value));
        }
        let fetched_at = weeks
            .last()
            .map(|r| r.fetched_at)
            .unwrap_or(info.fetched_at);

        let ctx = SeasonContext {
            final_week,
            rules: self.rules,
            eliminations: info.value.format.is_battle_royale(),
        };
        Ok(StoreRead {
            value: season_rankings(&scores, week, &ctx),
            fetched_at,
            stale,
            error,
        })
    }

    /// Refresh events for one league.
    pub fn subscribe(&self, league: LeagueRef) -> impl Stream<Item = RefreshEvent> + Send + 'static {
        let rx = self.store.subscribe();
        stream::unfold((rx, league), |(mut rx, league)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.league() == &league => return Some((event, (rx, league))),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(league = %league, skipped = n, "Subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}

fn week_scores(slate: &WeekSlate) -> WeekScores {
    let mut teams: BTreeMap<CanonicalTeamId, TeamWeekScore> = BTreeMap::new();
    for matchup in &slate.matchups {
        for team in matchup.teams() {
            teams.entry(team.team_id.clone()).or_insert_with(|| TeamWeekScore {
                team_id: team.team_id.clone(),
                score: team.score,
                projected: team.projected_score,
            });
        }
    }
    WeekScores {
        week: slate.week,
        is_final: slate.all_final(),
        teams: teams.into_values().collect(),
    }
}
