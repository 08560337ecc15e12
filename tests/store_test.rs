mod common;

use common::{harness, league, slate, store_config, LEAGUE_ID};
use leaguesync::datasource::mock::sample_league;
use leaguesync::datasource::{DataSourceError, MockAdapter};
use leaguesync::domain::{LeagueId, MatchupStatus, PlatformSource, SnapshotId};
use leaguesync::store::{RefreshEvent, RefreshOutcome, StoreConfig, StoreError, TrackedLeague};
use std::time::Duration;

fn snapshot_id(week: u32) -> SnapshotId {
    SnapshotId::new(PlatformSource::B, LeagueId::new(LEAGUE_ID), "1", week)
}

fn mock_with_week(week: u32) -> MockAdapter {
    MockAdapter::new(PlatformSource::B).with_matchups(
        &LeagueId::new(LEAGUE_ID),
        week,
        slate(week, MatchupStatus::Live, 50.0, 40.0),
    )
}

#[tokio::test]
async fn test_concurrent_gets_share_one_fetch() {
    let h = harness(mock_with_week(3).with_delay(Duration::from_millis(50)), store_config());
    let id = snapshot_id(3);

    let gets = (0..8).map(|_| h.store.get(&id, Duration::from_secs(60)));
    let results = futures::future::join_all(gets).await;

    assert_eq!(h.mock.matchup_calls(), 1);
    for result in results {
        let read = result.unwrap();
        assert_eq!(read.value.home.score, 50.0);
        assert!(!read.stale);
    }
}

#[tokio::test]
async fn test_staleness_bound_controls_refetch() {
    let h = harness(mock_with_week(3), store_config());
    let id = snapshot_id(3);
    h.store.get(&id, Duration::from_secs(60)).await.unwrap();
    assert_eq!(h.mock.matchup_calls(), 1);

    h.clock.advance(Duration::from_secs(30));
    h.store.get(&id, Duration::from_secs(60)).await.unwrap();
    assert_eq!(h.mock.matchup_calls(), 1, "30s old value is fresh enough");

    h.clock.advance(Duration::from_secs(31));
    h.store.get(&id, Duration::from_secs(60)).await.unwrap();
    assert_eq!(h.mock.matchup_calls(), 2, "61s old value triggers one refresh");
}

#[tokio::test]
async fn test_serve_stale_on_error() {
    let h = harness(mock_with_week(3), store_config());
    let id = snapshot_id(3);
    let first = h.store.get(&id, Duration::from_secs(60)).await.unwrap();
    let mut events = h.store.subscribe();

    h.mock.set_failure(Some(DataSourceError::Network("connection reset".into())));
    h.clock.advance(Duration::from_secs(120));
    let read = h.store.get(&id, Duration::from_secs(60)).await.unwrap();

    assert!(read.stale);
    assert_eq!(read.error, Some(DataSourceError::Network("connection reset".into())));
    assert_eq!(read.value, first.value);
    assert_eq!(read.fetched_at, first.fetched_at);

    match events.recv().await.unwrap() {
        RefreshEvent::Failed { serving_stale, rate_limited, .. } => {
            assert!(serving_stale);
            assert!(!rate_limited);
        }
        other => panic!("expected failure event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_cached_value_is_no_data() {
    let h = harness(MockAdapter::new(PlatformSource::B), store_config());
    h.mock.set_failure(Some(DataSourceError::Network("down".into())));
    let err = h.store.get(&snapshot_id(1), Duration::from_secs(60)).await.unwrap_err();
    assert!(matches!(err, StoreError::NoData(DataSourceError::Network(_))));
}

#[tokio::test]
async fn test_unknown_matchup_is_not_found() {
    let h = harness(mock_with_week(3), store_config());
    let id = SnapshotId::new(PlatformSource::B, LeagueId::new(LEAGUE_ID), "42", 3);
    let err = h.store.get(&id, Duration::from_secs(60)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_unregistered_platform() {
    let h = harness(mock_with_week(3), store_config());
    let id = SnapshotId::new(PlatformSource::A, LeagueId::new("1"), "1", 3);
    let err = h.store.get(&id, Duration::from_secs(60)).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownAdapter(PlatformSource::A)));
}

#[tokio::test]
async fn test_adapter_timeout_is_reported() {
    let config = StoreConfig {
        fetch_timeout: Duration::from_millis(20),
        ..store_config()
    };
    let h = harness(mock_with_week(3).with_delay(Duration::from_millis(200)), config);
    let err = h.store.get(&snapshot_id(3), Duration::from_secs(60)).await.unwrap_err();
    assert!(matches!(err, StoreError::NoData(DataSourceError::Timeout(20))));
}

#[tokio::test]
async fn test_forced_refresh_throttle() {
    let h = harness(mock_with_week(3), store_config());
    h.store.track(TrackedLeague::new(league(), 3));

    let first = h.store.refresh(Some(&league()), true).await;
    assert!(matches!(
        first.results[0].1,
        Ok(RefreshOutcome::Refreshed { changed: true, live: true })
    ));

    h.clock.advance(Duration::from_millis(500));
    let second = h.store.refresh(Some(&league()), true).await;
    assert_eq!(second.results[0].1, Ok(RefreshOutcome::Throttled { live: true }));
    assert_eq!(h.mock.matchup_calls(), 1);

    h.clock.advance(Duration::from_secs(2));
    let third = h.store.refresh(Some(&league()), true).await;
    assert!(matches!(
        third.results[0].1,
        Ok(RefreshOutcome::Refreshed { changed: false, .. })
    ));
    assert_eq!(h.mock.matchup_calls(), 2);
}

#[tokio::test]
async fn test_unforced_refresh_respects_ttl() {
    let h = harness(mock_with_week(3), store_config());
    h.store.track(TrackedLeague::new(league(), 3));
    h.store.refresh(None, false).await;
    let report = h.store.refresh(None, false).await;
    assert_eq!(report.results[0].1, Ok(RefreshOutcome::AlreadyFresh { live: true }));
    assert_eq!(h.mock.matchup_calls(), 1);
}

#[tokio::test]
async fn test_changed_flag_follows_scores() {
    let h = harness(mock_with_week(3), store_config());
    h.store.track(TrackedLeague::new(league(), 3));
    let mut events = h.store.subscribe();

    h.store.refresh(None, true).await;
    h.mock.set_matchups(
        &LeagueId::new(LEAGUE_ID),
        3,
        slate(3, MatchupStatus::Live, 57.5, 40.0),
    );
    h.clock.advance(Duration::from_secs(5));
    h.store.refresh(None, true).await;

    let mut changed = Vec::new();
    for _ in 0..2 {
        if let RefreshEvent::Updated { changed: c, .. } = events.recv().await.unwrap() {
            changed.push(c);
        }
    }
    assert_eq!(changed, vec![true, true]);
    assert!(h.store.any_live());
}

#[tokio::test]
async fn test_refresh_fans_out_over_tracked_leagues() {
    let mock = mock_with_week(3).with_matchups(
        &LeagueId::new("901"),
        1,
        slate(1, MatchupStatus::Scheduled, 0.0, 0.0),
    );
    let h = harness(mock, store_config());
    h.store.track(TrackedLeague::new(league(), 3));
    h.store.track(TrackedLeague::new(
        leaguesync::domain::LeagueRef::new(PlatformSource::B, "901"),
        1,
    ));

    let report = h.store.refresh(None, true).await;
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.failures(), 0);
    assert!(report.any_live());
    assert_eq!(h.mock.matchup_calls(), 2);
}

#[tokio::test]
async fn test_rate_limit_surfaces_in_report() {
    let h = harness(mock_with_week(3), store_config());
    h.store.track(TrackedLeague::new(league(), 3));
    h.mock.set_failure(Some(DataSourceError::RateLimited));
    let report = h.store.refresh(None, true).await;
    assert!(report.any_rate_limited());
    let state = h.store.refresh_state(&league()).unwrap();
    assert_eq!(state.last_error.as_deref(), Some("Rate limited"));
    assert!(state.last_fetch.is_none());
}

#[tokio::test]
async fn test_week_change_does_not_mix_slates() {
    let mock = mock_with_week(3)
        .with_matchups(&LeagueId::new(LEAGUE_ID), 4, slate(4, MatchupStatus::Scheduled, 0.0, 0.0))
        .with_delay(Duration::from_millis(30));
    let h = harness(mock, store_config());
    h.store.track(TrackedLeague::new(league(), 3));

    let league_id = league();
    let old_week = h.store.get_matchups(&league_id, 3, Duration::from_secs(60));
    assert!(h.store.set_week(&league(), 4));
    let new_week = h.store.get_matchups(&league_id, 4, Duration::from_secs(60));
    let (old_week, new_week) = futures::join!(old_week, new_week);

    assert_eq!(old_week.unwrap().value.week, 3);
    assert_eq!(new_week.unwrap().value.week, 4);
    assert_eq!(h.store.tracked()[0].week, 4);
}

#[tokio::test]
async fn test_invalidated_fetch_never_overwrites_newer_slate() {
    let h = harness(mock_with_week(3).with_delay(Duration::from_millis(40)), store_config());
    let league_id = league();
    let slow = h.store.get_matchups(&league_id, 3, Duration::ZERO);
    let invalidate_then_fetch = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        h.store.invalidate(&league(), 3);
        h.mock.set_matchups(
            &LeagueId::new(LEAGUE_ID),
            3,
            slate(3, MatchupStatus::Final, 99.0, 1.0),
        );
        h.store.get_matchups(&league(), 3, Duration::ZERO).await
    };
    let (_, fresh) = futures::join!(slow, invalidate_then_fetch);

    assert_eq!(fresh.unwrap().value.matchups[0].home.score, 99.0);
    let cached = h.store.peek_matchups(&league(), 3).unwrap();
    assert_eq!(cached.matchups[0].home.score, 99.0);
}

#[tokio::test]
async fn test_refresh_follows_platform_current_week() {
    let league_id = LeagueId::new(LEAGUE_ID);
    let mock = mock_with_week(1)
        .with_league(sample_league(PlatformSource::B, LEAGUE_ID))
        .with_matchups(&league_id, 2, slate(2, MatchupStatus::Scheduled, 0.0, 0.0));
    let h = harness(mock, store_config());
    h.store.track(TrackedLeague::new(league(), 1));

    h.store.refresh(None, false).await;
    assert_eq!(h.store.tracked()[0].week, 1);

    // The season moves on and week 2 kicks off.
    h.mock.set_league(leaguesync::domain::LeagueInfo {
        current_week: 2,
        ..sample_league(PlatformSource::B, LEAGUE_ID)
    });
    h.mock.set_matchups(&league_id, 2, slate(2, MatchupStatus::Live, 7.0, 3.0));
    h.clock.advance(Duration::from_secs(301));

    let report = h.store.refresh(None, false).await;
    assert!(report.any_live());
    assert_eq!(h.store.tracked()[0].week, 2);
    assert!(h.store.any_live());
    assert_eq!(h.store.refresh_state(&league()).unwrap().week, 2);
}

#[tokio::test]
async fn test_refresh_keeps_week_when_league_lookup_fails() {
    let h = harness(mock_with_week(3), store_config());
    h.store.track(TrackedLeague::new(league(), 3));

    let report = h.store.refresh(None, false).await;
    assert_eq!(report.failures(), 0);
    assert_eq!(h.store.tracked()[0].week, 3);
    assert_eq!(h.mock.matchup_calls(), 1);
}
