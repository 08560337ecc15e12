//! Matchup data store: the single owner of every cached snapshot.
//!
//! Callers only ever `get` or `refresh`. Fetches go through per-key
//! single-flight caches, are bounded by a timeout, and on failure the last
//! good snapshot keeps being served with the error reported alongside it.

pub mod cache;
pub mod clock;

pub use cache::{Cached, SnapshotCache};
pub use clock::{Clock, ManualClock, SystemClock};

use crate::datasource::{AdapterSet, DataSourceError, PlatformAdapter};
use crate::domain::{
    BundledScoring, LeagueFormat, LeagueInfo, LeagueRef, MatchupSnapshot, PlatformSource,
    RawStatRecord, SnapshotId, Week,
};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Store tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Default staleness bound for non-forced reads.
    pub ttl: Duration,
    /// Forced refreshes of one league closer together than this are no-ops.
    pub force_refresh_min_interval: Duration,
    /// Upper bound on any single adapter call.
    pub fetch_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            force_refresh_min_interval: Duration::from_secs(2),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The fetch failed and nothing was cached to fall back on.
    #[error("no data available: {0}")]
    NoData(DataSourceError),
    #[error("no adapter registered for platform {0}")]
    UnknownAdapter(PlatformSource),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("week {week} is past the final week {final_week}")]
    WeekOutOfRange { week: Week, final_week: Week },
}

impl StoreError {
    pub fn source_error(&self) -> Option<&DataSourceError> {
        match self {
            StoreError::NoData(e) => Some(e),
            _ => None,
        }
    }
}

/// A value served by the store plus its freshness.
///
/// `error` is set when the latest fetch failed and `value` is the last
/// known-good copy.
#[derive(Debug, Clone)]
pub struct StoreRead<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
    pub error: Option<DataSourceError>,
}

impl<T> StoreRead<T> {
    fn fresh(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value,
            fetched_at,
            stale: false,
            error: None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StoreRead<U> {
        StoreRead {
            value: f(self.value),
            fetched_at: self.fetched_at,
            stale: self.stale,
            error: self.error,
        }
    }
}

/// All matchups of one league week, fetched together.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekSlate {
    pub league: LeagueRef,
    pub week: Week,
    pub matchups: Vec<MatchupSnapshot>,
    /// Digest of ids, scores and statuses; changes whenever anything visible moves.
    pub fingerprint: String,
}

impl WeekSlate {
    pub fn new(league: LeagueRef, week: Week, matchups: Vec<MatchupSnapshot>) -> Self {
        let fingerprint = fingerprint(&matchups);
        Self {
            league,
            week,
            matchups,
            fingerprint,
        }
    }

    pub fn find(&self, matchup_id: &str) -> Option<&MatchupSnapshot> {
        self.matchups.iter().find(|m| m.id.matchup_id == matchup_id)
    }

    pub fn any_live(&self) -> bool {
        self.matchups.iter().any(MatchupSnapshot::is_live)
    }

    pub fn all_final(&self) -> bool {
        !self.matchups.is_empty()
            && self
                .matchups
                .iter()
                .all(|m| m.status == crate::domain::MatchupStatus::Final)
    }
}

fn fingerprint(matchups: &[MatchupSnapshot]) -> String {
    let mut hasher = Sha256::new();
    for m in matchups {
        hasher.update(m.id.to_string());
        hasher.update(format!("{:?}", m.status));
        for team in m.teams() {
            hasher.update(team.team_id.as_str());
            hasher.update(format!("{:.4}|{:.4}", team.score, team.projected_score));
            for entry in &team.roster {
                hasher.update(entry.player.as_str());
                hasher.update(if entry.is_starter { b"S" } else { b"B" });
            }
        }
    }
    let hash = hasher.finalize();
    hex::encode(&hash[..16])
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlateKey {
    pub league: LeagueRef,
    pub week: Week,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoxScoreKey {
    pub league: LeagueRef,
    pub matchup_id: String,
    pub week: Week,
}

/// A league the store keeps refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedLeague {
    pub league: LeagueRef,
    pub week: Week,
    /// Bundled scoring table for battle-royale leagues with custom scoring.
    pub bundled_scoring: Option<BundledScoring>,
}

impl TrackedLeague {
    pub fn new(league: LeagueRef, week: Week) -> Self {
        Self {
            league,
            week,
            bundled_scoring: None,
        }
    }
}

/// Notification pushed to subscribers after every fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RefreshEvent {
    #[serde(rename_all = "camelCase")]
    Updated {
        league: LeagueRef,
        week: Week,
        fetched_at: DateTime<Utc>,
        changed: bool,
        live: bool,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        league: LeagueRef,
        week: Week,
        error: String,
        rate_limited: bool,
        serving_stale: bool,
    },
    #[serde(rename_all = "camelCase")]
    Throttled { league: LeagueRef },
}

impl RefreshEvent {
    pub fn league(&self) -> &LeagueRef {
        match self {
            RefreshEvent::Updated { league, .. }
            | RefreshEvent::Failed { league, .. }
            | RefreshEvent::Throttled { league } => league,
        }
    }
}

/// Result of refreshing one league.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed { changed: bool, live: bool },
    /// Cached data was within TTL and the refresh was not forced.
    AlreadyFresh { live: bool },
    /// Forced refresh inside the throttle window; the cached value stands.
    Throttled { live: bool },
}

impl RefreshOutcome {
    pub fn is_live(&self) -> bool {
        match self {
            RefreshOutcome::Refreshed { live, .. }
            | RefreshOutcome::AlreadyFresh { live }
            | RefreshOutcome::Throttled { live } => *live,
        }
    }
}

/// Per-league results of one `refresh` call.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub results: Vec<(LeagueRef, Result<RefreshOutcome, DataSourceError>)>,
}

impl RefreshReport {
    pub fn any_live(&self) -> bool {
        self.results
            .iter()
            .any(|(_, r)| r.as_ref().is_ok_and(RefreshOutcome::is_live))
    }

    pub fn any_rate_limited(&self) -> bool {
        self.results
            .iter()
            .any(|(_, r)| r.as_ref().is_err_and(DataSourceError::is_rate_limited))
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }
}

/// Read-only view of a league's refresh bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueRefreshState {
    pub league: LeagueRef,
    pub week: Week,
    pub last_fetch: Option<DateTime<Utc>>,
    pub in_flight: bool,
    pub last_error: Option<String>,
}

struct StoreInner {
    adapters: AdapterSet,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
    slates: Arc<SnapshotCache<SlateKey, WeekSlate>>,
    leagues: Arc<SnapshotCache<LeagueRef, LeagueInfo>>,
    box_scores: Arc<SnapshotCache<BoxScoreKey, Vec<RawStatRecord>>>,
    tracked: Mutex<BTreeMap<LeagueRef, TrackedLeague>>,
    last_forced: Mutex<HashMap<LeagueRef, DateTime<Utc>>>,
    events: broadcast::Sender<RefreshEvent>,
}

/// Cheap-to-clone handle to the shared store.
#[derive(Clone)]
pub struct MatchupStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for MatchupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchupStore")
            .field("config", &self.inner.config)
            .field("platforms", &self.inner.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl MatchupStore {
    pub fn new(adapters: AdapterSet, clock: Arc<dyn Clock>, config: StoreConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                adapters,
                slates: Arc::new(SnapshotCache::new(Arc::clone(&clock))),
                leagues: Arc::new(SnapshotCache::new(Arc::clone(&clock))),
                box_scores: Arc::new(SnapshotCache::new(Arc::clone(&clock))),
                clock,
                config,
                tracked: Mutex::new(BTreeMap::new()),
                last_forced: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn config(&self) -> StoreConfig {
        self.inner.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    // =========================================================================
    // League registry
    // =========================================================================

    /// Start tracking a league (or update its week and scoring hint).
    pub fn track(&self, tracked: TrackedLeague) {
        info!(league = %tracked.league, week = tracked.week, "Tracking league");
        lock(&self.inner.tracked).insert(tracked.league.clone(), tracked);
    }

    /// Move a tracked league to a new week. In-flight fetches for the old
    /// week finish on their own key and do not affect the new week.
    pub fn set_week(&self, league: &LeagueRef, week: Week) -> bool {
        match lock(&self.inner.tracked).get_mut(league) {
            Some(t) => {
                t.week = week;
                true
            }
            None => false,
        }
    }

    pub fn tracked(&self) -> Vec<TrackedLeague> {
        lock(&self.inner.tracked).values().cloned().collect()
    }

    pub fn tracked_league(&self, league: &LeagueRef) -> Option<TrackedLeague> {
        lock(&self.inner.tracked).get(league).cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.inner.events.subscribe()
    }

    pub fn refresh_state(&self, league: &LeagueRef) -> Option<LeagueRefreshState> {
        let tracked = self.tracked_league(league)?;
        let key = SlateKey {
            league: league.clone(),
            week: tracked.week,
        };
        Some(LeagueRefreshState {
            league: league.clone(),
            week: tracked.week,
            last_fetch: self.inner.slates.cached(&key).map(|c| c.fetched_at),
            in_flight: self.inner.slates.is_in_flight(&key),
            last_error: self.inner.slates.last_error(&key).map(|e| e.to_string()),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// One matchup, served from cache when fetched within `max_staleness`.
    pub async fn get(
        &self,
        id: &SnapshotId,
        max_staleness: Duration,
    ) -> Result<StoreRead<MatchupSnapshot>, StoreError> {
        let league = LeagueRef {
            platform: id.platform,
            league_id: id.league_id.clone(),
        };
        let slate = self.get_matchups(&league, id.week, max_staleness).await?;
        let snapshot = slate
            .value
            .find(&id.matchup_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("matchup {}", id)))?;
        Ok(slate.map(|_| snapshot))
    }

    /// Every matchup of a league week.
    pub async fn get_matchups(
        &self,
        league: &LeagueRef,
        week: Week,
        max_staleness: Duration,
    ) -> Result<StoreRead<Arc<WeekSlate>>, StoreError> {
        let key = SlateKey {
            league: league.clone(),
            week,
        };
        if let Some(cached) = self.inner.slates.fresh(&key, max_staleness) {
            return Ok(StoreRead::fresh(cached.value, cached.fetched_at));
        }
        let start = self.slate_fetch(league.clone(), week)?;
        let result = self.inner.slates.join_or_start(&key, start).await;
        serve(&self.inner.slates, &key, result)
    }

    /// League metadata with its scoring rules resolved when the platform
    /// exposes them.
    pub async fn get_league(
        &self,
        league: &LeagueRef,
        max_staleness: Duration,
    ) -> Result<StoreRead<Arc<LeagueInfo>>, StoreError> {
        if let Some(cached) = self.inner.leagues.fresh(league, max_staleness) {
            return Ok(StoreRead::fresh(cached.value, cached.fetched_at));
        }
        let adapter = self.adapter(league.platform)?;
        let timeout = self.inner.config.fetch_timeout;
        let tracked = self.tracked_league(league);
        let league_id = league.league_id.clone();
        let start = move || {
            async move {
                let mut info = with_timeout(timeout, adapter.fetch_league(&league_id)).await?;
                if info.scoring.is_none() {
                    match with_timeout(timeout, adapter.fetch_scoring_settings(&league_id)).await {
                        Ok(rules) => info.scoring = rules,
                        Err(e) => warn!(league = %league_id, error = %e, "Scoring settings unavailable"),
                    }
                }
                if let Some(bundled) = tracked.and_then(|t| t.bundled_scoring) {
                    info.format = LeagueFormat::BattleRoyale {
                        bundled: Some(bundled),
                    };
                }
                Ok(info)
            }
            .boxed()
        };
        let result = self.inner.leagues.join_or_start(league, start).await;
        serve(&self.inner.leagues, league, result)
    }

    /// Raw per-player stats for one matchup.
    pub async fn get_box_score(
        &self,
        league: &LeagueRef,
        matchup_id: &str,
        week: Week,
        max_staleness: Duration,
    ) -> Result<StoreRead<Arc<Vec<RawStatRecord>>>, StoreError> {
        let key = BoxScoreKey {
            league: league.clone(),
            matchup_id: matchup_id.to_string(),
            week,
        };
        if let Some(cached) = self.inner.box_scores.fresh(&key, max_staleness) {
            return Ok(StoreRead::fresh(cached.value, cached.fetched_at));
        }
        let adapter = self.adapter(league.platform)?;
        let timeout = self.inner.config.fetch_timeout;
        let league_id = league.league_id.clone();
        let matchup = matchup_id.to_string();
        let start = move || {
            async move {
                with_timeout(timeout, adapter.fetch_box_score(&league_id, &matchup, week)).await
            }
            .boxed()
        };
        let result = self.inner.box_scores.join_or_start(&key, start).await;
        serve(&self.inner.box_scores, &key, result)
    }

    /// Last cached slate without triggering a fetch.
    pub fn peek_matchups(&self, league: &LeagueRef, week: Week) -> Option<Arc<WeekSlate>> {
        let key = SlateKey {
            league: league.clone(),
            week,
        };
        self.inner.slates.cached(&key).map(|c| c.value)
    }

    /// Whether any tracked league's current week has a live matchup, per cache.
    pub fn any_live(&self) -> bool {
        self.tracked()
            .iter()
            .filter_map(|t| self.peek_matchups(&t.league, t.week))
            .any(|slate| slate.any_live())
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Refresh one league (`Some`) or every tracked league (`None`).
    ///
    /// `force` bypasses the TTL but not the throttle window. Leagues are
    /// fetched concurrently; the report is returned once all complete.
    pub async fn refresh(&self, league: Option<&LeagueRef>, force: bool) -> RefreshReport {
        let targets: Vec<TrackedLeague> = match league {
            Some(l) => match self.tracked_league(l) {
                Some(t) => vec![t],
                // Untracked leagues refresh their platform-reported current week.
                None => match self.get_league(l, self.inner.config.ttl).await {
                    Ok(info) => vec![TrackedLeague::new(l.clone(), info.value.current_week.max(1))],
                    Err(e) => {
                        let err = match e {
                            StoreError::NoData(err) => err,
                            other => DataSourceError::NotFound(other.to_string()),
                        };
                        return RefreshReport {
                            results: vec![(l.clone(), Err(err))],
                        };
                    }
                },
            },
            None => self.tracked(),
        };

        let futures = targets.into_iter().map(|t| {
            let store = self.clone();
            async move {
                let outcome = store.refresh_one(&t, force).await;
                (t.league, outcome)
            }
        });
        RefreshReport {
            results: join_all(futures).await,
        }
    }

    /// Moves a tracked league forward when its platform reports a later
    /// current week. League metadata is read through the TTL cache; a
    /// failed lookup keeps the tracked week.
    async fn follow_current_week(&self, tracked: &TrackedLeague) -> TrackedLeague {
        let mut tracked = tracked.clone();
        match self.get_league(&tracked.league, self.inner.config.ttl).await {
            Ok(info) if info.value.current_week > tracked.week => {
                let week = info.value.current_week;
                info!(league = %tracked.league, from = tracked.week, to = week, "Advancing tracked week");
                self.set_week(&tracked.league, week);
                tracked.week = week;
            }
            Ok(_) => {}
            Err(e) => debug!(league = %tracked.league, error = %e, "Current week unavailable"),
        }
        tracked
    }

    async fn refresh_one(
        &self,
        tracked: &TrackedLeague,
        force: bool,
    ) -> Result<RefreshOutcome, DataSourceError> {
        let tracked = &self.follow_current_week(tracked).await;
        let key = SlateKey {
            league: tracked.league.clone(),
            week: tracked.week,
        };
        let cached = self.inner.slates.cached(&key);
        let cached_live = cached.as_ref().is_some_and(|c| c.value.any_live());

        if force {
            if self.throttled(&tracked.league) {
                debug!(league = %tracked.league, "Forced refresh throttled");
                let _ = self.inner.events.send(RefreshEvent::Throttled {
                    league: tracked.league.clone(),
                });
                return Ok(RefreshOutcome::Throttled { live: cached_live });
            }
        } else if self.inner.slates.fresh(&key, self.inner.config.ttl).is_some() {
            return Ok(RefreshOutcome::AlreadyFresh { live: cached_live });
        }

        let previous = cached.map(|c| c.value.fingerprint.clone());
        let start = self
            .slate_fetch(tracked.league.clone(), tracked.week)
            .map_err(|e| DataSourceError::NotFound(e.to_string()))?;
        let fetched = self.inner.slates.join_or_start(&key, start).await?;
        Ok(RefreshOutcome::Refreshed {
            changed: previous.as_deref() != Some(fetched.value.fingerprint.as_str()),
            live: fetched.value.any_live(),
        })
    }

    /// Records the forced refresh unless it falls inside the throttle window.
    fn throttled(&self, league: &LeagueRef) -> bool {
        let now = self.inner.clock.now();
        let mut last = lock(&self.inner.last_forced);
        if let Some(prev) = last.get(league) {
            if clock::elapsed_since(now, *prev) < self.inner.config.force_refresh_min_interval {
                return true;
            }
        }
        last.insert(league.clone(), now);
        false
    }

    /// Supersede any in-flight fetch for a league week.
    pub fn invalidate(&self, league: &LeagueRef, week: Week) {
        self.inner.slates.invalidate(&SlateKey {
            league: league.clone(),
            week,
        });
    }

    fn adapter(&self, platform: PlatformSource) -> Result<Arc<dyn PlatformAdapter>, StoreError> {
        self.inner
            .adapters
            .get(&platform)
            .cloned()
            .ok_or(StoreError::UnknownAdapter(platform))
    }

    /// Builds the fetch for a league week. The fetch stamps snapshots with
    /// store time and publishes exactly one event per network round trip.
    fn slate_fetch(
        &self,
        league: LeagueRef,
        week: Week,
    ) -> Result<impl FnOnce() -> BoxFuture<'static, Result<WeekSlate, DataSourceError>>, StoreError>
    {
        let adapter = self.adapter(league.platform)?;
        let inner = Arc::clone(&self.inner);
        Ok(move || {
            async move {
                let key = SlateKey {
                    league: league.clone(),
                    week,
                };
                let previous = inner.slates.cached(&key).map(|c| c.value.fingerprint.clone());
                let result = with_timeout(
                    inner.config.fetch_timeout,
                    adapter.fetch_matchups(&league.league_id, week),
                )
                .await;

                match result {
                    Ok(matchups) => {
                        let now = inner.clock.now();
                        let matchups = matchups
                            .into_iter()
                            .map(|m| MatchupSnapshot { fetched_at: now, ..m })
                            .collect();
                        let slate = WeekSlate::new(league.clone(), week, matchups);
                        debug!(league = %league, week, matchups = slate.matchups.len(), "Fetched slate");
                        let _ = inner.events.send(RefreshEvent::Updated {
                            league,
                            week,
                            fetched_at: now,
                            changed: previous.as_deref() != Some(slate.fingerprint.as_str()),
                            live: slate.any_live(),
                        });
                        Ok(slate)
                    }
                    Err(e) => {
                        warn!(league = %league, week, error = %e, "Slate fetch failed");
                        let _ = inner.events.send(RefreshEvent::Failed {
                            league,
                            week,
                            error: e.to_string(),
                            rate_limited: e.is_rate_limited(),
                            serving_stale: previous.is_some(),
                        });
                        Err(e)
                    }
                }
            }
            .boxed()
        })
    }
}

async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, DataSourceError>
where
    F: Future<Output = Result<T, DataSourceError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| DataSourceError::Timeout(timeout.as_millis() as u64))?
}

/// Turn a fetch result into a read, falling back to the last good value.
fn serve<K, V>(
    cache: &SnapshotCache<K, V>,
    key: &K,
    result: Result<Cached<V>, DataSourceError>,
) -> Result<StoreRead<Arc<V>>, StoreError>
where
    K: Eq + std::hash::Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Send + Sync + 'static,
{
    match result {
        Ok(fetched) => Ok(StoreRead::fresh(fetched.value, fetched.fetched_at)),
        Err(err) => match cache.cached(key) {
            Some(last_good) => {
                warn!(key = ?key, error = %err, "Serving stale snapshot");
                Ok(StoreRead {
                    value: last_good.value,
                    fetched_at: last_good.fetched_at,
                    stale: true,
                    error: Some(err),
                })
            }
            None => Err(StoreError::NoData(err)),
        },
    }
}
