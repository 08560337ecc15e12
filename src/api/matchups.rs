use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::{AppState, CachedResponse, LeaguePath};
use crate::domain::{MatchupSnapshot, Week};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub week: Option<Week>,
}

#[derive(Debug, Deserialize)]
pub struct MatchupPath {
    pub platform: String,
    pub league_id: String,
    pub matchup_id: String,
}

pub async fn get_matchups(
    Path(path): Path<LeaguePath>,
    Query(params): Query<WeekQuery>,
    State(state): State<AppState>,
) -> Result<Json<CachedResponse<Vec<MatchupSnapshot>>>, AppError> {
    let league = path.league()?;
    let week = state.resolve_week(&league, params.week).await?;
    let read = state.queries.get_matchups(&league, week).await?;
    Ok(Json(read.map(|slate| slate.matchups.clone()).into()))
}

pub async fn get_matchup(
    Path(path): Path<MatchupPath>,
    Query(params): Query<WeekQuery>,
    State(state): State<AppState>,
) -> Result<Json<CachedResponse<MatchupSnapshot>>, AppError> {
    let league = crate::api::parse_league(&path.platform, &path.league_id)?;
    let week = state.resolve_week(&league, params.week).await?;
    let read = state
        .queries
        .get_matchup(&league, week, &path.matchup_id)
        .await?;
    Ok(Json(read.into()))
}
