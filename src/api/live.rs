use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::api::{parse_league, AppState, LeaguePath};
use crate::domain::LeagueRef;
use crate::error::AppError;
use crate::orchestration::RefreshState;
use crate::store::{RefreshEvent, RefreshOutcome};

const KEEP_ALIVE_SECS: u64 = 15;

/// Server-sent refresh events for one league.
pub async fn events(
    Path(path): Path<LeaguePath>,
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let league = path.league()?;
    tracing::debug!(league = %league, "Event subscriber connected");
    let stream = state.queries.subscribe(league).map(|event| {
        let name = match &event {
            RefreshEvent::Updated { .. } => "updated",
            RefreshEvent::Failed { .. } => "failed",
            RefreshEvent::Throttled { .. } => "throttled",
        };
        Event::default().event(name).json_data(&event)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshQuery {
    pub platform: Option<String>,
    pub league_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub league: LeagueRef,
    pub outcome: &'static str,
    pub changed: bool,
    pub live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Manual refresh. Bypasses cadence but not the store's throttle window.
pub async fn refresh(
    Query(params): Query<RefreshQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RefreshResult>>, AppError> {
    let target = match (params.platform.as_deref(), params.league_id.as_deref()) {
        (Some(platform), Some(league_id)) => Some(parse_league(platform, league_id)?),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "platform and leagueId must be given together".to_string(),
            ))
        }
    };

    let report = state.queries.store().refresh(target.as_ref(), true).await;
    let results = report
        .results
        .into_iter()
        .map(|(league, result)| match result {
            Ok(outcome) => {
                let (name, changed) = match outcome {
                    RefreshOutcome::Refreshed { changed, .. } => ("refreshed", changed),
                    RefreshOutcome::AlreadyFresh { .. } => ("fresh", false),
                    RefreshOutcome::Throttled { .. } => ("throttled", false),
                };
                RefreshResult {
                    league,
                    outcome: name,
                    changed,
                    live: outcome.is_live(),
                    error: None,
                }
            }
            Err(e) => RefreshResult {
                league,
                outcome: if e.is_rate_limited() { "rateLimited" } else { "failed" },
                changed: false,
                live: false,
                error: Some(e.to_string()),
            },
        })
        .collect();
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub foreground: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub foreground: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<RefreshState>,
}

pub async fn set_activity(
    State(state): State<AppState>,
    Json(body): Json<ActivityRequest>,
) -> Json<ActivityResponse> {
    state.activity.set_foreground(body.foreground);
    Json(ActivityResponse {
        foreground: state.activity.is_foreground(),
        scheduler: state.scheduler.as_ref().map(|s| s.state()),
    })
}
