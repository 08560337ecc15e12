//! Mock adapter for testing without network calls.

use super::{DataSourceError, PlatformAdapter};
use crate::domain::{
    LeagueFormat, LeagueId, LeagueInfo, LeagueStatus, MatchupSnapshot, PlatformSource,
    RawStatRecord, ScoringRuleset, Week,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    leagues: HashMap<LeagueId, LeagueInfo>,
    matchups: HashMap<(LeagueId, Week), Vec<MatchupSnapshot>>,
    box_scores: HashMap<(LeagueId, String, Week), Vec<RawStatRecord>>,
    scoring: HashMap<LeagueId, ScoringRuleset>,
    failure: Option<DataSourceError>,
}

/// Mock adapter that serves predefined data, counts calls, and can be told
/// to fail or to respond slowly.
#[derive(Debug)]
pub struct MockAdapter {
    source: PlatformSource,
    delay: Duration,
    state: Mutex<MockState>,
    matchup_calls: AtomicUsize,
    league_calls: AtomicUsize,
    box_score_calls: AtomicUsize,
}

impl MockAdapter {
    /// Create a new mock adapter with empty data.
    pub fn new(source: PlatformSource) -> Self {
        Self {
            source,
            delay: Duration::ZERO,
            state: Mutex::new(MockState::default()),
            matchup_calls: AtomicUsize::new(0),
            league_calls: AtomicUsize::new(0),
            box_score_calls: AtomicUsize::new(0),
        }
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_league(self, league: LeagueInfo) -> Self {
        self.set_league(league);
        self
    }

    pub fn with_matchups(self, league_id: &LeagueId, week: Week, matchups: Vec<MatchupSnapshot>) -> Self {
        self.set_matchups(league_id, week, matchups);
        self
    }

    pub fn with_box_score(
        self,
        league_id: &LeagueId,
        matchup_id: &str,
        week: Week,
        records: Vec<RawStatRecord>,
    ) -> Self {
        self.lock()
            .box_scores
            .insert((league_id.clone(), matchup_id.to_string(), week), records);
        self
    }

    pub fn with_scoring(self, league_id: &LeagueId, rules: ScoringRuleset) -> Self {
        self.lock().scoring.insert(league_id.clone(), rules);
        self
    }

    pub fn set_league(&self, league: LeagueInfo) {
        self.lock().leagues.insert(league.league_id.clone(), league);
    }

    /// Replace the matchups served for a league week.
    pub fn set_matchups(&self, league_id: &LeagueId, week: Week, matchups: Vec<MatchupSnapshot>) {
        self.lock().matchups.insert((league_id.clone(), week), matchups);
    }

    /// Fail every subsequent call with `error` until cleared with `None`.
    pub fn set_failure(&self, error: Option<DataSourceError>) {
        self.lock().failure = error;
    }

    pub fn matchup_calls(&self) -> usize {
        self.matchup_calls.load(Ordering::SeqCst)
    }

    pub fn league_calls(&self) -> usize {
        self.league_calls.load(Ordering::SeqCst)
    }

    pub fn box_score_calls(&self) -> usize {
        self.box_score_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn pause_and_check(&self) -> Result<(), DataSourceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.lock().failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A minimal in-season league for tests.
pub fn sample_league(source: PlatformSource, league_id: &str) -> LeagueInfo {
    LeagueInfo {
        league_id: LeagueId::new(league_id),
        platform: source,
        name: format!("League {}", league_id),
        status: LeagueStatus::InSeason,
        season: 2024,
        current_week: 1,
        final_week: 17,
        team_count: 0,
        format: LeagueFormat::HeadToHead,
        scoring: None,
        teams: Vec::new(),
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn source(&self) -> PlatformSource {
        self.source
    }

    async fn fetch_league(&self, league_id: &LeagueId) -> Result<LeagueInfo, DataSourceError> {
        self.league_calls.fetch_add(1, Ordering::SeqCst);
        self.pause_and_check().await?;
        self.lock()
            .leagues
            .get(league_id)
            .cloned()
            .ok_or_else(|| DataSourceError::NotFound(format!("league {}", league_id)))
    }

    async fn fetch_matchups(
        &self,
        league_id: &LeagueId,
        week: Week,
    ) -> Result<Vec<MatchupSnapshot>, DataSourceError> {
        self.matchup_calls.fetch_add(1, Ordering::SeqCst);
        // Answer with the data as it was when the request was made.
        let matchups = self
            .lock()
            .matchups
            .get(&(league_id.clone(), week))
            .cloned()
            .unwrap_or_default();
        self.pause_and_check().await?;
        Ok(matchups)
    }

    async fn fetch_box_score(
        &self,
        league_id: &LeagueId,
        matchup_id: &str,
        week: Week,
    ) -> Result<Vec<RawStatRecord>, DataSourceError> {
        self.box_score_calls.fetch_add(1, Ordering::SeqCst);
        self.pause_and_check().await?;
        self.lock()
            .box_scores
            .get(&(league_id.clone(), matchup_id.to_string(), week))
            .cloned()
            .ok_or_else(|| DataSourceError::NotFound(format!("matchup {}", matchup_id)))
    }

    async fn fetch_scoring_settings(
        &self,
        league_id: &LeagueId,
    ) -> Result<Option<ScoringRuleset>, DataSourceError> {
        self.pause_and_check().await?;
        Ok(self.lock().scoring.get(league_id).cloned())
    }
}
