//! Breakdowns and rankings through the query layer.

mod common;

use common::{harness, league, matchup, store_config, team, Harness, LEAGUE_ID};
use leaguesync::datasource::mock::sample_league;
use leaguesync::datasource::MockAdapter;
use leaguesync::domain::{
    BundledScoring, CanonicalPlayerId, CanonicalTeamId, Confidence, EliminationStatus,
    LeagueFormat, LeagueId, LeagueInfo, MatchupStatus, PlatformSource, RawStatRecord, RuleSource,
    ScoringRuleset, StatSource,
};
use leaguesync::engine::legacy_ruleset;
use leaguesync::store::{StoreError, TrackedLeague};
use leaguesync::{IdentityMapper, LeagueQueries};
use std::collections::BTreeMap;
use std::sync::Arc;

const PLAYER: &str = "nfl-p-0001";
/// Platform B id of `PLAYER` in the bundled dataset.
const PLAYER_NATIVE: &str = "4046";

fn league_info(format: LeagueFormat, scoring: Option<ScoringRuleset>) -> LeagueInfo {
    LeagueInfo {
        current_week: 3,
        format,
        scoring,
        ..sample_league(PlatformSource::B, LEAGUE_ID)
    }
}

fn full_ppr() -> ScoringRuleset {
    ScoringRuleset::from_table(&[("rec", 1.0), ("rec_yd", 0.1), ("rec_td", 6.0)])
}

fn receiver_line() -> RawStatRecord {
    let stats: BTreeMap<String, f64> = [("rec", 5.0), ("rec_yd", 80.0), ("rec_td", 1.0)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    RawStatRecord::new(
        CanonicalPlayerId::new(PLAYER),
        PlatformSource::B,
        3,
        StatSource::Live,
        stats,
    )
}

fn breakdown_mock(info: LeagueInfo, reported: Option<f64>) -> MockAdapter {
    let league_id = LeagueId::new(LEAGUE_ID);
    MockAdapter::new(PlatformSource::B)
        .with_league(info)
        .with_matchups(
            &league_id,
            3,
            vec![matchup(
                "1",
                3,
                MatchupStatus::Live,
                team("t1", 19.0, &[(PLAYER, reported), ("nfl-p-0009", None)]),
                team("t2", 4.0, &[("nfl-p-0002", Some(4.0))]),
            )],
        )
        .with_box_score(&league_id, "1", 3, vec![receiver_line()])
}

fn queries(h: &Harness) -> LeagueQueries {
    LeagueQueries::new(h.store.clone(), Arc::new(IdentityMapper::bundled().unwrap()))
}

#[tokio::test]
async fn test_breakdown_matches_reported_total() {
    let info = league_info(LeagueFormat::HeadToHead, Some(full_ppr()));
    let h = harness(breakdown_mock(info, Some(19.0)), store_config());

    let read = queries(&h).get_breakdown(&league(), 3, "1", PLAYER).await.unwrap();
    let result = read.value;
    assert_eq!(result.team_id, CanonicalTeamId::new("t1"));
    assert!(result.is_starter);

    let breakdown = result.breakdown;
    assert_eq!(breakdown.source, RuleSource::League);
    assert_eq!(breakdown.confidence, Confidence::High);
    assert_eq!(breakdown.total, 19.0);
    assert!(breakdown.discrepancy.is_none());
    let keys: Vec<&str> = breakdown.items.iter().map(|i| i.stat_key.as_str()).collect();
    assert_eq!(keys, vec!["rec_yd", "rec_td", "rec"]);
}

#[tokio::test]
async fn test_breakdown_flags_discrepancy_and_keeps_reported_total() {
    let info = league_info(LeagueFormat::HeadToHead, Some(full_ppr()));
    let h = harness(breakdown_mock(info, Some(18.5)), store_config());

    let read = queries(&h).get_breakdown(&league(), 3, "1", PLAYER).await.unwrap();
    let breakdown = read.value.breakdown;
    assert_eq!(breakdown.total, 18.5);
    let discrepancy = breakdown.discrepancy.unwrap();
    assert!((discrepancy.delta - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_breakdown_accepts_native_player_id() {
    let info = league_info(LeagueFormat::HeadToHead, Some(full_ppr()));
    let h = harness(breakdown_mock(info, Some(19.0)), store_config());

    let read = queries(&h)
        .get_breakdown(&league(), 3, "1", PLAYER_NATIVE)
        .await
        .unwrap();
    assert_eq!(read.value.player.as_str(), PLAYER);
}

#[tokio::test]
async fn test_bundled_format_scores_battle_royale_league() {
    let info = league_info(LeagueFormat::BattleRoyale { bundled: None }, None);
    let h = harness(breakdown_mock(info, Some(16.5)), store_config());
    h.store.track(TrackedLeague {
        bundled_scoring: Some(BundledScoring::HalfPpr),
        ..TrackedLeague::new(league(), 3)
    });

    let read = queries(&h).get_breakdown(&league(), 3, "1", PLAYER).await.unwrap();
    let breakdown = read.value.breakdown;
    assert_eq!(breakdown.source, RuleSource::BattleRoyaleFormat);
    assert_eq!(breakdown.total, 16.5);
    assert!(breakdown.discrepancy.is_none());
}

#[tokio::test]
async fn test_legacy_table_is_opt_in() {
    let info = league_info(LeagueFormat::HeadToHead, None);
    let h = harness(breakdown_mock(info, Some(16.5)), store_config());

    let plain = queries(&h).get_breakdown(&league(), 3, "1", PLAYER).await.unwrap();
    assert_eq!(plain.value.breakdown.source, RuleSource::ReportedTotal);
    assert_eq!(plain.value.breakdown.total, 16.5);

    let with_legacy = queries(&h)
        .with_legacy_table(PlatformSource::B, legacy_ruleset(PlatformSource::B))
        .get_breakdown(&league(), 3, "1", PLAYER)
        .await
        .unwrap();
    assert_eq!(with_legacy.value.breakdown.source, RuleSource::Legacy);
    assert_eq!(with_legacy.value.breakdown.confidence, Confidence::Low);
}

#[tokio::test]
async fn test_player_without_stat_line_scores_zero() {
    let info = league_info(LeagueFormat::HeadToHead, Some(full_ppr()));
    let h = harness(breakdown_mock(info, Some(19.0)), store_config());

    let read = queries(&h)
        .get_breakdown(&league(), 3, "1", "nfl-p-0009")
        .await
        .unwrap();
    let result = read.value;
    assert_eq!(result.breakdown.total, 0.0);
    assert_eq!(result.breakdown.computed_total, Some(0.0));
    assert!(result.breakdown.items.is_empty(), "zero stats produce no lines");
}

#[tokio::test]
async fn test_breakdown_unknown_player() {
    let info = league_info(LeagueFormat::HeadToHead, Some(full_ppr()));
    let h = harness(breakdown_mock(info, Some(19.0)), store_config());

    let err = queries(&h)
        .get_breakdown(&league(), 3, "1", "nobody")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

// =============================================================================
// Rankings
// =============================================================================

fn four_team_week(week: u32, status: MatchupStatus, scores: [f64; 4]) -> Vec<leaguesync::MatchupSnapshot> {
    vec![
        matchup("1", week, status, team("t1", scores[0], &[]), team("t2", scores[1], &[])),
        matchup("2", week, status, team("t3", scores[2], &[]), team("t4", scores[3], &[])),
    ]
}

fn rankings_harness(format: LeagueFormat) -> Harness {
    let league_id = LeagueId::new(LEAGUE_ID);
    let mock = MockAdapter::new(PlatformSource::B)
        .with_league(league_info(format, None))
        .with_matchups(&league_id, 1, four_team_week(1, MatchupStatus::Final, [100.0, 90.0, 80.0, 70.0]))
        .with_matchups(&league_id, 2, four_team_week(2, MatchupStatus::Live, [40.0, 55.0, 20.0, 0.0]));
    harness(mock, store_config())
}

#[tokio::test]
async fn test_rankings_carry_season_eliminations() {
    let h = rankings_harness(LeagueFormat::BattleRoyale { bundled: None });

    let read = queries(&h).get_rankings(&league(), 2).await.unwrap();
    let rankings = read.value;
    assert_eq!(rankings.len(), 4);

    let order: Vec<&str> = rankings.iter().map(|r| r.team_id.as_str()).collect();
    assert_eq!(order, vec!["t2", "t1", "t3", "t4"]);
    let last = rankings.last().unwrap();
    assert_eq!(last.status, EliminationStatus::Eliminated);
    assert_eq!(last.eliminated_week, Some(1));
    assert_eq!(last.survival_probability, 0.0);

    for ranking in &rankings[..3] {
        assert!(ranking.status.is_alive());
        assert!(ranking.survival_probability >= 0.01 && ranking.survival_probability <= 0.99);
    }
    assert_eq!(h.mock.matchup_calls(), 2);
}

#[tokio::test]
async fn test_head_to_head_rankings_never_eliminate() {
    let h = rankings_harness(LeagueFormat::HeadToHead);

    let read = queries(&h).get_rankings(&league(), 2).await.unwrap();
    assert!(read.value.iter().all(|r| r.status.is_alive()));
    assert_eq!(read.value.last().unwrap().team_id.as_str(), "t4");
}

#[tokio::test]
async fn test_rankings_past_final_week_are_rejected_without_fetching() {
    let h = rankings_harness(LeagueFormat::BattleRoyale { bundled: None });

    let err = queries(&h).get_rankings(&league(), 5000).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::WeekOutOfRange { week: 5000, final_week: 17 }
    ));
    assert_eq!(h.mock.matchup_calls(), 0);

    let read = queries(&h).get_rankings(&league(), 17).await.unwrap();
    assert!(read.value.is_empty(), "no matchups scheduled yet");
    assert_eq!(h.mock.matchup_calls(), 17);
}
