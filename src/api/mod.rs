pub mod health;
pub mod live;
pub mod matchups;
pub mod scoring;

use crate::domain::{LeagueRef, PlatformSource, Week};
use crate::error::AppError;
use crate::orchestration::{ActivityHandle, LeagueQueries, SchedulerHandle};
use crate::store::StoreRead;
use axum::{
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub queries: LeagueQueries,
    pub activity: ActivityHandle,
    pub scheduler: Option<SchedulerHandle>,
}

impl AppState {
    pub fn new(queries: LeagueQueries, activity: ActivityHandle) -> Self {
        Self {
            queries,
            activity,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerHandle) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// The requested week, else the tracked week, else the platform's current week.
    pub async fn resolve_week(&self, league: &LeagueRef, week: Option<Week>) -> Result<Week, AppError> {
        if let Some(week) = week {
            if week == 0 {
                return Err(AppError::BadRequest("week must be at least 1".to_string()));
            }
            return Ok(week);
        }
        let store = self.queries.store();
        if let Some(tracked) = store.tracked_league(league) {
            return Ok(tracked.week);
        }
        let info = store.get_league(league, store.config().ttl).await?;
        Ok(info.value.current_week.max(1))
    }
}

/// `/v1/leagues/:platform/:league_id` path segments.
#[derive(Debug, Deserialize)]
pub struct LeaguePath {
    pub platform: String,
    pub league_id: String,
}

impl LeaguePath {
    pub fn league(&self) -> Result<LeagueRef, AppError> {
        parse_league(&self.platform, &self.league_id)
    }
}

pub(crate) fn parse_league(platform: &str, league_id: &str) -> Result<LeagueRef, AppError> {
    let platform = PlatformSource::from_str(platform).map_err(AppError::BadRequest)?;
    let league_id = league_id.trim();
    if league_id.is_empty() {
        return Err(AppError::BadRequest("leagueId must not be empty".to_string()));
    }
    Ok(LeagueRef::new(platform, league_id))
}

/// Cached payload plus the freshness hints clients use for "may be stale" UI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse<T> {
    pub data: T,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<StoreRead<T>> for CachedResponse<T> {
    fn from(read: StoreRead<T>) -> Self {
        Self {
            data: read.value,
            fetched_at: read.fetched_at,
            stale: read.stale,
            error: read.error.map(|e| e.to_string()),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/leagues/:platform/:league_id/matchups",
            get(matchups::get_matchups),
        )
        .route(
            "/v1/leagues/:platform/:league_id/matchups/:matchup_id",
            get(matchups::get_matchup),
        )
        .route(
            "/v1/leagues/:platform/:league_id/breakdown",
            get(scoring::get_breakdown),
        )
        .route(
            "/v1/leagues/:platform/:league_id/rankings",
            get(scoring::get_rankings),
        )
        .route("/v1/leagues/:platform/:league_id/events", get(live::events))
        .route("/v1/refresh", post(live::refresh))
        .route("/v1/activity", put(live::set_activity))
        .layer(cors)
        .with_state(state)
}
