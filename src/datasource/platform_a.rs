//! Platform A client: numeric stat ids, home/away schedule payloads.
//!
//! Endpoints:
//! - `GET {base}/leagues/{id}` league settings, status flags, teams
//! - `GET {base}/leagues/{id}/matchups?week={w}` schedule with rosters and stats

use super::http::{bool_field, f64_field, id_field, opt_f64_field, str_field, JsonClient};
use super::{DataSourceError, PlatformAdapter};
use crate::domain::{
    LeagueFormat, LeagueId, LeagueInfo, MatchupSnapshot, MatchupStatus, PlatformSource,
    RawStatRecord, RosterEntry, ScoringRuleset, SnapshotId, StatSource, StatusSignals, TeamInfo,
    TeamSnapshot, Week,
};
use crate::identity::IdentityMapper;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SOURCE: PlatformSource = PlatformSource::A;
const DEFAULT_FINAL_WEEK: Week = 17;
/// Lineup slots that do not score.
const BENCH_SLOTS: [i64; 2] = [20, 21];

#[derive(Debug, Clone)]
pub struct PlatformAClient {
    http: JsonClient,
    identity: Arc<IdentityMapper>,
}

impl PlatformAClient {
    pub fn new(base_url: String, timeout: Duration, identity: Arc<IdentityMapper>) -> Self {
        Self {
            http: JsonClient::new(base_url, timeout),
            identity,
        }
    }

    pub fn with_http(http: JsonClient, identity: Arc<IdentityMapper>) -> Self {
        Self { http, identity }
    }

    async fn league_payload(&self, league_id: &LeagueId) -> Result<Value, DataSourceError> {
        self.http
            .get_json(&format!("/leagues/{}", league_id), &[])
            .await
    }

    async fn matchups_payload(
        &self,
        league_id: &LeagueId,
        week: Week,
    ) -> Result<Value, DataSourceError> {
        self.http
            .get_json(
                &format!("/leagues/{}/matchups", league_id),
                &[("week", week.to_string())],
            )
            .await
    }

    /// The current matchup period, from the matchups payload when present and
    /// from the league otherwise.
    async fn current_week(&self, league_id: &LeagueId, payload: &Value) -> Result<Week, DataSourceError> {
        if let Some(week) = reported_current_week(payload) {
            return Ok(week);
        }
        let has_entries = payload
            .get("schedule")
            .and_then(|v| v.as_array())
            .is_some_and(|entries| !entries.is_empty());
        if !has_entries {
            // Nothing to classify.
            return Ok(1);
        }
        let league = self.league_payload(league_id).await?;
        Ok(reported_current_week(&league).unwrap_or(1))
    }
}

#[async_trait]
impl PlatformAdapter for PlatformAClient {
    fn source(&self) -> PlatformSource {
        SOURCE
    }

    async fn fetch_league(&self, league_id: &LeagueId) -> Result<LeagueInfo, DataSourceError> {
        debug!(league = %league_id, "Fetching platform A league");
        let payload = self.league_payload(league_id).await?;
        parse_league(&payload, league_id, &self.identity)
    }

    async fn fetch_matchups(
        &self,
        league_id: &LeagueId,
        week: Week,
    ) -> Result<Vec<MatchupSnapshot>, DataSourceError> {
        debug!(league = %league_id, week, "Fetching platform A matchups");
        let payload = self.matchups_payload(league_id, week).await?;
        let current = self.current_week(league_id, &payload).await?;
        parse_matchups(&payload, league_id, week, current, &self.identity)
    }

    async fn fetch_box_score(
        &self,
        league_id: &LeagueId,
        matchup_id: &str,
        week: Week,
    ) -> Result<Vec<RawStatRecord>, DataSourceError> {
        debug!(league = %league_id, matchup = matchup_id, week, "Fetching platform A box score");
        let payload = self.matchups_payload(league_id, week).await?;
        let current = self.current_week(league_id, &payload).await?;
        parse_box_score(&payload, matchup_id, week, current, &self.identity)
    }

    async fn fetch_scoring_settings(
        &self,
        league_id: &LeagueId,
    ) -> Result<Option<ScoringRuleset>, DataSourceError> {
        let payload = self.league_payload(league_id).await?;
        Ok(parse_scoring(&payload))
    }
}

pub(crate) fn parse_league(
    payload: &Value,
    league_id: &LeagueId,
    identity: &IdentityMapper,
) -> Result<LeagueInfo, DataSourceError> {
    if !payload.is_object() {
        return Err(DataSourceError::Decoding(
            "Expected league object".to_string(),
        ));
    }
    let settings = payload.get("settings").cloned().unwrap_or(Value::Null);
    let status = payload.get("status").cloned().unwrap_or(Value::Null);

    let signals = StatusSignals {
        draft_in_progress: bool_field(&status, "draftInProgress"),
        complete: bool_field(&status, "isFinished"),
        active: bool_field(&status, "isActive"),
    };

    let format = match settings.get("format").and_then(|v| v.as_str()) {
        Some(f) if f.eq_ignore_ascii_case("GUILLOTINE") => LeagueFormat::BattleRoyale { bundled: None },
        _ => LeagueFormat::HeadToHead,
    };

    let teams = parse_teams(payload, league_id, identity);
    let team_count = settings
        .get("size")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(teams.len());

    Ok(LeagueInfo {
        league_id: league_id.clone(),
        platform: SOURCE,
        name: str_field(&settings, "name"),
        status: signals.resolve(),
        season: payload.get("seasonId").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        current_week: status
            .get("currentMatchupPeriod")
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as Week,
        final_week: settings
            .get("finalScoringPeriod")
            .and_then(|v| v.as_u64())
            .map(|w| w as Week)
            .unwrap_or(DEFAULT_FINAL_WEEK),
        team_count,
        format,
        scoring: parse_scoring(payload),
        teams,
    })
}

fn parse_teams(payload: &Value, league_id: &LeagueId, identity: &IdentityMapper) -> Vec<TeamInfo> {
    let Some(teams) = payload.get("teams").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    teams
        .iter()
        .filter_map(|team| {
            let id = id_field(team, "id")?;
            Some(TeamInfo {
                id: identity.resolve_team(&format!("{}.{}", league_id, id), SOURCE),
                name: team_name(team),
                owner: team
                    .get("owners")
                    .and_then(|v| v.as_array())
                    .and_then(|owners| owners.first())
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

fn team_name(team: &Value) -> String {
    let name = str_field(team, "name");
    if !name.is_empty() {
        return name;
    }
    let location = str_field(team, "location");
    let nickname = str_field(team, "nickname");
    format!("{} {}", location, nickname).trim().to_string()
}

pub(crate) fn parse_scoring(payload: &Value) -> Option<ScoringRuleset> {
    let items = payload
        .get("settings")?
        .get("scoringSettings")?
        .get("scoringItems")?
        .as_array()?;

    let native: BTreeMap<String, f64> = items
        .iter()
        .filter_map(|item| Some((id_field(item, "statId")?, opt_f64_field(item, "points")?)))
        .collect();
    let rules = ScoringRuleset::from_native(SOURCE, &native);
    (!rules.is_empty()).then_some(rules)
}

pub(crate) fn parse_matchups(
    payload: &Value,
    league_id: &LeagueId,
    week: Week,
    current_week: Week,
    identity: &IdentityMapper,
) -> Result<Vec<MatchupSnapshot>, DataSourceError> {
    let schedule = payload
        .get("schedule")
        .and_then(|v| v.as_array())
        .ok_or_else(|| DataSourceError::Decoding("Expected schedule array".to_string()))?;
    let team_meta = team_lookup(payload, league_id, identity);

    let mut snapshots = Vec::new();
    for entry in schedule {
        let period = entry.get("matchupPeriodId").and_then(|v| v.as_u64());
        if period.is_some_and(|p| p as Week != week) {
            continue;
        }
        match parse_matchup(entry, league_id, week, current_week, &team_meta, identity) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => warn!(league = %league_id, week, error = %e, "Skipping malformed matchup"),
        }
    }
    Ok(snapshots)
}

fn reported_current_week(payload: &Value) -> Option<Week> {
    payload
        .get("currentMatchupPeriod")
        .or_else(|| payload.get("status").and_then(|s| s.get("currentMatchupPeriod")))
        .and_then(|v| v.as_u64())
        .map(|w| w as Week)
}

fn team_lookup(
    payload: &Value,
    league_id: &LeagueId,
    identity: &IdentityMapper,
) -> HashMap<String, TeamInfo> {
    parse_teams(payload, league_id, identity)
        .into_iter()
        .map(|t| (t.id.as_str().to_string(), t))
        .collect()
}

fn parse_matchup(
    entry: &Value,
    league_id: &LeagueId,
    week: Week,
    current_week: Week,
    team_meta: &HashMap<String, TeamInfo>,
    identity: &IdentityMapper,
) -> Result<MatchupSnapshot, DataSourceError> {
    let matchup_id = id_field(entry, "id")
        .ok_or_else(|| DataSourceError::Decoding("Missing matchup id".to_string()))?;
    let home = entry
        .get("home")
        .ok_or_else(|| DataSourceError::Decoding(format!("Matchup {} missing home", matchup_id)))?;
    let away = entry
        .get("away")
        .ok_or_else(|| DataSourceError::Decoding(format!("Matchup {} missing away", matchup_id)))?;

    let home = parse_team_side(home, league_id, team_meta, identity)?;
    let away = parse_team_side(away, league_id, team_meta, identity)?;
    let status = matchup_status(entry, week, current_week, home.score + away.score);

    Ok(MatchupSnapshot {
        id: SnapshotId::new(SOURCE, league_id.clone(), matchup_id, week),
        home,
        away,
        status,
        fetched_at: Utc::now(),
    })
}

/// An explicit winner always wins; otherwise the week position decides.
fn matchup_status(
    entry: &Value,
    week: Week,
    current_week: Week,
    combined_points: f64,
) -> MatchupStatus {
    let winner = str_field(entry, "winner");
    if !winner.is_empty() && !winner.eq_ignore_ascii_case("UNDECIDED") {
        return MatchupStatus::Final;
    }
    if week < current_week {
        MatchupStatus::Final
    } else if week == current_week && combined_points > 0.0 {
        MatchupStatus::Live
    } else {
        MatchupStatus::Scheduled
    }
}

fn parse_team_side(
    side: &Value,
    league_id: &LeagueId,
    team_meta: &HashMap<String, TeamInfo>,
    identity: &IdentityMapper,
) -> Result<TeamSnapshot, DataSourceError> {
    let team_id = id_field(side, "teamId")
        .ok_or_else(|| DataSourceError::Decoding("Missing teamId".to_string()))?;
    let team_id = identity.resolve_team(&format!("{}.{}", league_id, team_id), SOURCE);
    let meta = team_meta.get(team_id.as_str());

    let roster = side
        .get("roster")
        .and_then(|r| r.get("entries"))
        .and_then(|e| e.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| parse_roster_entry(e, identity))
                .collect()
        })
        .unwrap_or_default();

    Ok(TeamSnapshot {
        name: meta.map(|m| m.name.clone()).unwrap_or_default(),
        owner: meta.map(|m| m.owner.clone()).unwrap_or_default(),
        team_id,
        score: f64_field(side, "totalPoints"),
        projected_score: f64_field(side, "totalProjectedPoints"),
        roster,
    })
}

fn parse_roster_entry(entry: &Value, identity: &IdentityMapper) -> Option<RosterEntry> {
    let player_id = id_field(entry, "playerId")?;
    let slot = entry.get("lineupSlotId").and_then(|v| v.as_i64()).unwrap_or(20);
    Some(RosterEntry {
        player: identity.resolve_rostered(&player_id, SOURCE),
        is_starter: !BENCH_SLOTS.contains(&slot),
        lineup_slot: lineup_slot_name(slot).to_string(),
        reported_points: opt_f64_field(entry, "appliedTotal"),
    })
}

fn lineup_slot_name(slot: i64) -> &'static str {
    match slot {
        0 => "QB",
        2 => "RB",
        4 => "WR",
        6 => "TE",
        16 => "DEF",
        17 => "K",
        20 => "BN",
        21 => "IR",
        23 => "FLEX",
        _ => "OTHER",
    }
}

pub(crate) fn parse_box_score(
    payload: &Value,
    matchup_id: &str,
    week: Week,
    current_week: Week,
    identity: &IdentityMapper,
) -> Result<Vec<RawStatRecord>, DataSourceError> {
    let schedule = payload
        .get("schedule")
        .and_then(|v| v.as_array())
        .ok_or_else(|| DataSourceError::Decoding("Expected schedule array".to_string()))?;
    let entry = schedule
        .iter()
        .find(|m| id_field(m, "id").as_deref() == Some(matchup_id))
        .ok_or_else(|| DataSourceError::NotFound(format!("matchup {}", matchup_id)))?;

    let combined = ["home", "away"]
        .iter()
        .filter_map(|side| entry.get(*side))
        .map(|side| f64_field(side, "totalPoints"))
        .sum();
    let stat_source = match matchup_status(entry, week, current_week, combined) {
        MatchupStatus::Final => StatSource::Final,
        _ => StatSource::Live,
    };

    let mut records = Vec::new();
    for side in ["home", "away"] {
        let entries = entry
            .get(side)
            .and_then(|s| s.get("roster"))
            .and_then(|r| r.get("entries"))
            .and_then(|e| e.as_array());
        for roster_entry in entries.into_iter().flatten() {
            let Some(player_id) = id_field(roster_entry, "playerId") else {
                continue;
            };
            let stats = actual_week_stats(roster_entry, week);
            records.push(RawStatRecord::new(
                identity.resolve_rostered(&player_id, SOURCE),
                SOURCE,
                week,
                stat_source,
                stats,
            ));
        }
    }
    Ok(records)
}

/// Actual (not projected) stats for `week`; `statSourceId` 0 is actual.
fn actual_week_stats(entry: &Value, week: Week) -> BTreeMap<String, f64> {
    entry
        .get("stats")
        .and_then(|v| v.as_array())
        .and_then(|blocks| {
            blocks.iter().find(|b| {
                b.get("statSourceId").and_then(|v| v.as_u64()).unwrap_or(0) == 0
                    && b.get("scoringPeriodId").and_then(|v| v.as_u64()) == Some(week as u64)
            })
        })
        .and_then(|b| b.get("stats"))
        .and_then(|s| s.as_object())
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| Some((k.clone(), super::http::as_f64_lenient(v)?)))
                .collect()
        })
        .unwrap_or_default()
}
