use crate::api::AppState;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.queries.store();
    let leagues: Vec<_> = store
        .tracked()
        .iter()
        .filter_map(|t| store.refresh_state(&t.league))
        .collect();
    Json(serde_json::json!({
        "status": "ready",
        "trackedLeagues": leagues,
        "scheduler": state.scheduler.as_ref().map(|s| s.state()),
    }))
}
