#![allow(dead_code)]

use chrono::Utc;
use leaguesync::datasource::{adapter_set, MockAdapter, PlatformAdapter};
use leaguesync::domain::{
    CanonicalPlayerId, CanonicalTeamId, LeagueId, LeagueRef, MatchupSnapshot, MatchupStatus,
    PlatformSource, RosterEntry, SnapshotId, TeamSnapshot, Week,
};
use leaguesync::store::{Clock, ManualClock, MatchupStore, StoreConfig};
use std::sync::Arc;
use std::time::Duration;

pub const LEAGUE_ID: &str = "900";

pub fn league() -> LeagueRef {
    LeagueRef::new(PlatformSource::B, LEAGUE_ID)
}

pub fn team(id: &str, score: f64, players: &[(&str, Option<f64>)]) -> TeamSnapshot {
    TeamSnapshot {
        team_id: CanonicalTeamId::new(id),
        name: format!("Team {}", id),
        owner: format!("owner-{}", id),
        score,
        projected_score: 100.0,
        roster: players
            .iter()
            .enumerate()
            .map(|(i, (player, points))| RosterEntry {
                player: CanonicalPlayerId::new(*player),
                is_starter: true,
                lineup_slot: format!("S{}", i + 1),
                reported_points: *points,
            })
            .collect(),
    }
}

pub fn matchup(
    matchup_id: &str,
    week: Week,
    status: MatchupStatus,
    home: TeamSnapshot,
    away: TeamSnapshot,
) -> MatchupSnapshot {
    MatchupSnapshot {
        id: SnapshotId::new(PlatformSource::B, LeagueId::new(LEAGUE_ID), matchup_id, week),
        home,
        away,
        status,
        fetched_at: Utc::now(),
    }
}

/// A one-matchup slate with the given scores.
pub fn slate(week: Week, status: MatchupStatus, home: f64, away: f64) -> Vec<MatchupSnapshot> {
    vec![matchup(
        "1",
        week,
        status,
        team("t1", home, &[("nfl-p-0001", Some(home))]),
        team("t2", away, &[("nfl-p-0002", Some(away))]),
    )]
}

pub fn store_config() -> StoreConfig {
    StoreConfig {
        ttl: Duration::from_secs(300),
        force_refresh_min_interval: Duration::from_secs(2),
        fetch_timeout: Duration::from_secs(5),
    }
}

pub struct Harness {
    pub mock: Arc<MockAdapter>,
    pub clock: Arc<ManualClock>,
    pub store: MatchupStore,
}

pub fn harness(mock: MockAdapter, config: StoreConfig) -> Harness {
    let mock = Arc::new(mock);
    let clock = Arc::new(ManualClock::default());
    let adapter: Arc<dyn PlatformAdapter> = mock.clone();
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let store = MatchupStore::new(adapter_set(vec![adapter]), clock_dyn, config);
    Harness { mock, clock, store }
}
