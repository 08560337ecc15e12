//! Platform B client: string stat keys, roster-keyed matchup rows.
//!
//! Endpoints:
//! - `GET {base}/league/{id}`
//! - `GET {base}/league/{id}/rosters`
//! - `GET {base}/league/{id}/users`
//! - `GET {base}/league/{id}/matchups/{week}`
//! - `GET {base}/stats/{season}/{week}`
//!
//! Matchup rows arrive one per roster; two rows sharing a `matchup_id` form
//! one matchup.

use super::http::{as_f64_lenient, f64_field, id_field, opt_f64_field, str_field, JsonClient};
use super::{DataSourceError, PlatformAdapter};
use crate::domain::{
    LeagueFormat, LeagueId, LeagueInfo, LeagueStatus, MatchupSnapshot, MatchupStatus,
    PlatformSource, RawStatRecord, RosterEntry, ScoringRuleset, SnapshotId, StatSource,
    StatusSignals, TeamInfo, TeamSnapshot, Week,
};
use crate::identity::IdentityMapper;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SOURCE: PlatformSource = PlatformSource::B;
const DEFAULT_FINAL_WEEK: Week = 17;
/// League `settings.type` value for guillotine leagues.
const GUILLOTINE_TYPE: u64 = 3;

#[derive(Debug, Clone)]
pub struct PlatformBClient {
    http: JsonClient,
    identity: Arc<IdentityMapper>,
}

/// Roster id -> (team name, owner name).
type RosterDirectory = HashMap<String, (String, String)>;

impl PlatformBClient {
    pub fn new(base_url: String, timeout: Duration, identity: Arc<IdentityMapper>) -> Self {
        Self {
            http: JsonClient::new(base_url, timeout),
            identity,
        }
    }

    pub fn with_http(http: JsonClient, identity: Arc<IdentityMapper>) -> Self {
        Self { http, identity }
    }

    async fn get(&self, path: String) -> Result<Value, DataSourceError> {
        self.http.get_json(&path, &[]).await
    }

    async fn roster_directory(&self, league_id: &LeagueId) -> Result<RosterDirectory, DataSourceError> {
        let (rosters, users) = futures::try_join!(
            self.get(format!("/league/{}/rosters", league_id)),
            self.get(format!("/league/{}/users", league_id)),
        )?;
        Ok(build_roster_directory(&rosters, &users))
    }
}

#[async_trait]
impl PlatformAdapter for PlatformBClient {
    fn source(&self) -> PlatformSource {
        SOURCE
    }

    async fn fetch_league(&self, league_id: &LeagueId) -> Result<LeagueInfo, DataSourceError> {
        debug!(league = %league_id, "Fetching platform B league");
        let (league, directory) = futures::try_join!(
            self.get(format!("/league/{}", league_id)),
            self.roster_directory(league_id),
        )?;
        parse_league(&league, &directory, league_id, &self.identity)
    }

    async fn fetch_matchups(
        &self,
        league_id: &LeagueId,
        week: Week,
    ) -> Result<Vec<MatchupSnapshot>, DataSourceError> {
        debug!(league = %league_id, week, "Fetching platform B matchups");
        let (league, directory, rows) = futures::try_join!(
            self.get(format!("/league/{}", league_id)),
            self.roster_directory(league_id),
            self.get(format!("/league/{}/matchups/{}", league_id, week)),
        )?;
        let context = WeekContext::from_league(&league, week);
        parse_matchups(&rows, &directory, league_id, &context, &self.identity)
    }

    async fn fetch_box_score(
        &self,
        league_id: &LeagueId,
        matchup_id: &str,
        week: Week,
    ) -> Result<Vec<RawStatRecord>, DataSourceError> {
        debug!(league = %league_id, matchup = matchup_id, week, "Fetching platform B box score");
        let (league, rows) = futures::try_join!(
            self.get(format!("/league/{}", league_id)),
            self.get(format!("/league/{}/matchups/{}", league_id, week)),
        )?;
        let context = WeekContext::from_league(&league, week);
        let season = str_field(&league, "season");
        let stats = self.get(format!("/stats/{}/{}", season, week)).await?;
        parse_box_score(&rows, &stats, matchup_id, &context, &self.identity)
    }

    async fn fetch_scoring_settings(
        &self,
        league_id: &LeagueId,
    ) -> Result<Option<ScoringRuleset>, DataSourceError> {
        let league = self.get(format!("/league/{}", league_id)).await?;
        Ok(parse_scoring(&league))
    }
}

/// What the league payload tells us about one week's state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WeekContext {
    pub week: Week,
    pub current_week: Week,
    pub complete: bool,
}

impl WeekContext {
    pub(crate) fn from_league(league: &Value, week: Week) -> Self {
        let settings = league.get("settings").cloned().unwrap_or(Value::Null);
        Self {
            week,
            current_week: settings.get("leg").and_then(|v| v.as_u64()).unwrap_or(1) as Week,
            complete: league_signals(league).resolve() == LeagueStatus::Complete,
        }
    }

    fn status(&self, combined_points: f64) -> MatchupStatus {
        if self.complete || self.week < self.current_week {
            MatchupStatus::Final
        } else if self.week == self.current_week && combined_points > 0.0 {
            MatchupStatus::Live
        } else {
            MatchupStatus::Scheduled
        }
    }
}

fn league_signals(league: &Value) -> StatusSignals {
    let status = str_field(league, "status");
    let draft_status = str_field(league, "draft_status");
    StatusSignals {
        draft_in_progress: status == "drafting" || draft_status == "drafting",
        complete: status == "complete",
        active: status == "in_season" || status == "post_season",
    }
}

fn build_roster_directory(rosters: &Value, users: &Value) -> RosterDirectory {
    let users: HashMap<String, &Value> = users
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|u| Some((id_field(u, "user_id")?, u)))
                .collect()
        })
        .unwrap_or_default();

    rosters
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|r| {
                    let roster_id = id_field(r, "roster_id")?;
                    let user = id_field(r, "owner_id").and_then(|id| users.get(&id).copied());
                    let owner = user.map(|u| str_field(u, "display_name")).unwrap_or_default();
                    let team_name = user
                        .and_then(|u| u.get("metadata"))
                        .map(|m| str_field(m, "team_name"))
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| owner.clone());
                    Some((roster_id, (team_name, owner)))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn team_id(league_id: &LeagueId, roster_id: &str, identity: &IdentityMapper) -> crate::domain::CanonicalTeamId {
    identity.resolve_team(&format!("{}.{}", league_id, roster_id), SOURCE)
}

pub(crate) fn parse_league(
    league: &Value,
    directory: &RosterDirectory,
    league_id: &LeagueId,
    identity: &IdentityMapper,
) -> Result<LeagueInfo, DataSourceError> {
    if !league.is_object() {
        return Err(DataSourceError::Decoding("Expected league object".to_string()));
    }
    let settings = league.get("settings").cloned().unwrap_or(Value::Null);

    let format = if settings.get("type").and_then(|v| v.as_u64()) == Some(GUILLOTINE_TYPE) {
        LeagueFormat::BattleRoyale { bundled: None }
    } else {
        LeagueFormat::HeadToHead
    };

    let mut teams: Vec<TeamInfo> = directory
        .iter()
        .map(|(roster_id, (name, owner))| TeamInfo {
            id: team_id(league_id, roster_id, identity),
            name: name.clone(),
            owner: owner.clone(),
        })
        .collect();
    teams.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(LeagueInfo {
        league_id: league_id.clone(),
        platform: SOURCE,
        name: str_field(league, "name"),
        status: league_signals(league).resolve(),
        season: str_field(league, "season").parse().unwrap_or(0),
        current_week: settings.get("leg").and_then(|v| v.as_u64()).unwrap_or(1) as Week,
        final_week: settings
            .get("final_leg")
            .and_then(|v| v.as_u64())
            .map(|w| w as Week)
            .unwrap_or(DEFAULT_FINAL_WEEK),
        team_count: league
            .get("total_rosters")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(teams.len()),
        format,
        scoring: parse_scoring(league),
        teams,
    })
}

pub(crate) fn parse_scoring(league: &Value) -> Option<ScoringRuleset> {
    let settings = league.get("scoring_settings")?.as_object()?;
    let native: BTreeMap<String, f64> = settings
        .iter()
        .filter_map(|(k, v)| Some((k.clone(), as_f64_lenient(v)?)))
        .collect();
    let rules = ScoringRuleset::from_native(SOURCE, &native);
    (!rules.is_empty()).then_some(rules)
}

pub(crate) fn parse_matchups(
    rows: &Value,
    directory: &RosterDirectory,
    league_id: &LeagueId,
    context: &WeekContext,
    identity: &IdentityMapper,
) -> Result<Vec<MatchupSnapshot>, DataSourceError> {
    let rows = rows
        .as_array()
        .ok_or_else(|| DataSourceError::Decoding("Expected matchup array".to_string()))?;

    // BTreeMap keeps matchup output order deterministic.
    let mut pairs: BTreeMap<String, Vec<&Value>> = BTreeMap::new();
    for row in rows {
        match id_field(row, "matchup_id") {
            Some(id) => pairs.entry(id).or_default().push(row),
            None => debug!(league = %league_id, "Row without matchup_id (bye week)"),
        }
    }

    let mut snapshots = Vec::new();
    for (matchup_id, sides) in pairs {
        let [home, away] = sides.as_slice() else {
            warn!(league = %league_id, matchup = %matchup_id, rows = sides.len(), "Skipping matchup without exactly two sides");
            continue;
        };
        let (home, away) = match (
            parse_side(home, directory, league_id, identity),
            parse_side(away, directory, league_id, identity),
        ) {
            (Ok(h), Ok(a)) => (h, a),
            (Err(e), _) | (_, Err(e)) => {
                warn!(league = %league_id, matchup = %matchup_id, error = %e, "Skipping malformed matchup");
                continue;
            }
        };
        let status = context.status(home.score + away.score);
        snapshots.push(MatchupSnapshot {
            id: SnapshotId::new(SOURCE, league_id.clone(), matchup_id, context.week),
            home,
            away,
            status,
            fetched_at: Utc::now(),
        });
    }
    Ok(snapshots)
}

fn parse_side(
    row: &Value,
    directory: &RosterDirectory,
    league_id: &LeagueId,
    identity: &IdentityMapper,
) -> Result<TeamSnapshot, DataSourceError> {
    let roster_id = id_field(row, "roster_id")
        .ok_or_else(|| DataSourceError::Decoding("Missing roster_id".to_string()))?;
    let (name, owner) = directory.get(&roster_id).cloned().unwrap_or_default();

    let starters: Vec<String> = string_list(row, "starters");
    let starter_set: HashSet<&str> = starters.iter().map(String::as_str).collect();
    let points = row.get("players_points");

    let mut players = starters.clone();
    for player in string_list(row, "players") {
        if !starter_set.contains(player.as_str()) {
            players.push(player);
        }
    }

    let roster = players
        .iter()
        .enumerate()
        .map(|(idx, player_id)| {
            let is_starter = starter_set.contains(player_id.as_str());
            RosterEntry {
                player: identity.resolve_rostered(player_id, SOURCE),
                is_starter,
                lineup_slot: if is_starter {
                    format!("S{}", idx + 1)
                } else {
                    "BN".to_string()
                },
                reported_points: points.and_then(|p| opt_f64_field(p, player_id)),
            }
        })
        .collect();

    Ok(TeamSnapshot {
        team_id: team_id(league_id, &roster_id, identity),
        name,
        owner,
        score: f64_field(row, "points"),
        projected_score: f64_field(row, "projected_points"),
        roster,
    })
}

/// String ids; the platform uses "0" as an empty starter slot.
fn string_list(row: &Value, key: &str) -> Vec<String> {
    row.get(key)
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.is_empty() && s != "0" => Some(s.clone()),
                    Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_box_score(
    rows: &Value,
    stats: &Value,
    matchup_id: &str,
    context: &WeekContext,
    identity: &IdentityMapper,
) -> Result<Vec<RawStatRecord>, DataSourceError> {
    let rows = rows
        .as_array()
        .ok_or_else(|| DataSourceError::Decoding("Expected matchup array".to_string()))?;
    let stats = stats
        .as_object()
        .ok_or_else(|| DataSourceError::Decoding("Expected stats object".to_string()))?;

    let sides: Vec<&Value> = rows
        .iter()
        .filter(|r| id_field(r, "matchup_id").as_deref() == Some(matchup_id))
        .collect();
    if sides.is_empty() {
        return Err(DataSourceError::NotFound(format!("matchup {}", matchup_id)));
    }

    let combined = sides.iter().map(|r| f64_field(r, "points")).sum();
    let source = match context.status(combined) {
        MatchupStatus::Final => StatSource::Final,
        _ => StatSource::Live,
    };

    let mut records = Vec::new();
    for side in sides {
        for player_id in string_list(side, "players") {
            let player_stats: BTreeMap<String, f64> = stats
                .get(&player_id)
                .and_then(|s| s.as_object())
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| Some((k.clone(), as_f64_lenient(v)?)))
                        .collect()
                })
                .unwrap_or_default();
            records.push(RawStatRecord::new(
                identity.resolve_rostered(&player_id, SOURCE),
                SOURCE,
                context.week,
                source,
                player_stats,
            ));
        }
    }
    Ok(records)
}
