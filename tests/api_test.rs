mod common;

use axum::http::StatusCode;
use common::{harness, league, matchup, slate, store_config, team, Harness, LEAGUE_ID};
use leaguesync::api;
use leaguesync::datasource::mock::sample_league;
use leaguesync::datasource::{DataSourceError, MockAdapter};
use leaguesync::domain::{
    CanonicalPlayerId, LeagueFormat, LeagueId, LeagueInfo, MatchupStatus, PlatformSource,
    RawStatRecord, ScoringRuleset, StatSource,
};
use leaguesync::orchestration::ActivityHandle;
use leaguesync::store::TrackedLeague;
use leaguesync::{IdentityMapper, LeagueQueries};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    harness: Harness,
    activity: ActivityHandle,
}

fn league_info() -> LeagueInfo {
    LeagueInfo {
        current_week: 3,
        format: LeagueFormat::BattleRoyale { bundled: None },
        scoring: Some(ScoringRuleset::from_table(&[("rec", 1.0), ("rec_yd", 0.1)])),
        ..sample_league(PlatformSource::B, LEAGUE_ID)
    }
}

fn setup_test_app() -> TestApp {
    let league_id = LeagueId::new(LEAGUE_ID);
    let stats: BTreeMap<String, f64> = [("rec".to_string(), 4.0), ("rec_yd".to_string(), 60.0)].into();
    let mock = MockAdapter::new(PlatformSource::B)
        .with_league(league_info())
        .with_matchups(&league_id, 1, slate(1, MatchupStatus::Final, 80.0, 60.0))
        .with_matchups(&league_id, 2, slate(2, MatchupStatus::Final, 90.0, 70.0))
        .with_matchups(
            &league_id,
            3,
            vec![matchup(
                "1",
                3,
                MatchupStatus::Live,
                team("t1", 10.0, &[("nfl-p-0001", Some(10.0))]),
                team("t2", 0.0, &[]),
            )],
        )
        .with_box_score(
            &league_id,
            "1",
            3,
            vec![RawStatRecord::new(
                CanonicalPlayerId::new("nfl-p-0001"),
                PlatformSource::B,
                3,
                StatSource::Live,
                stats,
            )],
        );
    let harness = harness(mock, store_config());
    harness.store.track(TrackedLeague::new(league(), 3));

    let queries = LeagueQueries::new(
        harness.store.clone(),
        Arc::new(IdentityMapper::bundled().unwrap()),
    );
    let activity = ActivityHandle::new(true);
    let app = api::create_router(api::AppState::new(queries, activity.clone()));
    TestApp {
        app,
        harness,
        activity,
    }
}

async fn send(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None).await
}

#[tokio::test]
async fn test_health_and_ready() {
    let t = setup_test_app();
    let (status, body) = get(t.app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = get(t.app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trackedLeagues"].as_array().unwrap().len(), 1);
    assert!(body["scheduler"].is_null());
}

#[tokio::test]
async fn test_matchups_default_to_tracked_week() {
    let t = setup_test_app();
    let (status, body) = get(t.app, "/v1/leagues/b/900/matchups").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["stale"], false);
    assert!(body.get("error").is_none());
    assert!(body["fetchedAt"].is_string());
    let matchups = body["data"].as_array().unwrap();
    assert_eq!(matchups.len(), 1);
    assert_eq!(matchups[0]["id"]["week"], 3);
    assert_eq!(matchups[0]["status"], "live");
    assert_eq!(matchups[0]["home"]["teamId"], "t1");
}

#[tokio::test]
async fn test_matchups_serve_stale_with_error() {
    let t = setup_test_app();
    let (status, _) = get(t.app.clone(), "/v1/leagues/b/900/matchups?week=2").await;
    assert_eq!(status, StatusCode::OK);

    t.harness.mock.set_failure(Some(DataSourceError::Network("reset".into())));
    t.harness.clock.advance(Duration::from_secs(600));
    let (status, body) = get(t.app, "/v1/leagues/b/900/matchups?week=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stale"], true);
    assert_eq!(body["error"], "Network error: reset");
    assert_eq!(body["data"][0]["home"]["score"], 90.0);
}

#[tokio::test]
async fn test_errors_map_to_statuses() {
    let t = setup_test_app();

    let (status, body) = get(t.app.clone(), "/v1/leagues/x/900/matchups").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("unknown platform"));

    let (status, _) = get(t.app.clone(), "/v1/leagues/a/1/matchups?week=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "platform without adapter");

    let (status, _) = get(t.app.clone(), "/v1/leagues/b/900/matchups?week=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(t.app.clone(), "/v1/leagues/b/900/rankings?week=4294967295").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("final week 17"));

    let (status, _) = get(t.app.clone(), "/v1/leagues/b/900/matchups/42?week=3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    t.harness.mock.set_failure(Some(DataSourceError::RateLimited));
    let (status, _) = get(t.app, "/v1/leagues/b/900/matchups?week=5").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_single_matchup() {
    let t = setup_test_app();
    let (status, body) = get(t.app, "/v1/leagues/b/900/matchups/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"]["matchupId"], "1");
    assert_eq!(body["data"]["away"]["score"], 0.0);
}

#[tokio::test]
async fn test_breakdown_endpoint() {
    let t = setup_test_app();
    let (status, body) = get(
        t.app.clone(),
        "/v1/leagues/b/900/breakdown?matchupId=1&player=nfl-p-0001",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["player"], "nfl-p-0001");
    assert_eq!(data["breakdown"]["source"], "league");
    assert_eq!(data["breakdown"]["total"], 10.0);
    assert!(data["breakdown"]["discrepancy"].is_null());
    assert_eq!(data["breakdown"]["items"][0]["statKey"], "rec_yd");

    let (status, body) = get(t.app, "/v1/leagues/b/900/breakdown?player=nfl-p-0001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "matchupId is required");
}

#[tokio::test]
async fn test_rankings_endpoint() {
    let t = setup_test_app();
    let (status, body) = get(t.app, "/v1/leagues/b/900/rankings").await;
    assert_eq!(status, StatusCode::OK);

    let rankings = body["data"].as_array().unwrap();
    assert_eq!(rankings.len(), 2);
    assert_eq!(rankings[0]["teamId"], "t1");
    assert_eq!(rankings[0]["week"], 3);
    // t2 lost both completed weeks; the second elimination is skipped
    // because only one team would remain.
    assert_eq!(rankings[1]["teamId"], "t2");
    assert_eq!(rankings[1]["status"], "eliminated");
    assert_eq!(rankings[1]["eliminatedWeek"], 1);
}

#[tokio::test]
async fn test_manual_refresh_and_throttle() {
    let t = setup_test_app();
    let (status, body) = send(t.app.clone(), "POST", "/v1/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["outcome"], "refreshed");
    assert_eq!(body[0]["live"], true);
    assert_eq!(body[0]["league"]["leagueId"], LEAGUE_ID);

    let (_, body) = send(t.app.clone(), "POST", "/v1/refresh?platform=b&leagueId=900", None).await;
    assert_eq!(body[0]["outcome"], "throttled");

    let (status, _) = send(t.app, "POST", "/v1/refresh?platform=b", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_activity_toggle() {
    let t = setup_test_app();
    let (status, body) = send(
        t.app,
        "PUT",
        "/v1/activity",
        Some(serde_json::json!({"foreground": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["foreground"], false);
    assert!(!t.activity.is_foreground());
}
