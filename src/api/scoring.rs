use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::matchups::WeekQuery;
use crate::api::{AppState, CachedResponse, LeaguePath};
use crate::domain::{TeamRanking, Week};
use crate::error::AppError;
use crate::orchestration::PlayerBreakdown;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownQuery {
    pub week: Option<Week>,
    pub matchup_id: Option<String>,
    pub player: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", name)))
}

pub async fn get_breakdown(
    Path(path): Path<LeaguePath>,
    Query(params): Query<BreakdownQuery>,
    State(state): State<AppState>,
) -> Result<Json<CachedResponse<PlayerBreakdown>>, AppError> {
    let league = path.league()?;
    let matchup_id = required(params.matchup_id, "matchupId")?;
    let player = required(params.player, "player")?;
    let week = state.resolve_week(&league, params.week).await?;

    let read = state
        .queries
        .get_breakdown(&league, week, &matchup_id, &player)
        .await?;
    Ok(Json(read.into()))
}

pub async fn get_rankings(
    Path(path): Path<LeaguePath>,
    Query(params): Query<WeekQuery>,
    State(state): State<AppState>,
) -> Result<Json<CachedResponse<Vec<TeamRanking>>>, AppError> {
    let league = path.league()?;
    let week = state.resolve_week(&league, params.week).await?;
    let read = state.queries.get_rankings(&league, week).await?;
    Ok(Json(read.into()))
}
