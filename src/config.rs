use crate::domain::{BundledScoring, LeagueRef, PlatformSource, Week};
use crate::engine::EliminationRules;
use crate::orchestration::SchedulerConfig;
use crate::store::{StoreConfig, TrackedLeague};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub platform_a_api_url: String,
    pub platform_b_api_url: String,
    pub id_map_path: Option<String>,
    pub tracked_leagues: Vec<TrackedLeague>,
    pub current_week: Week,
    pub snapshot_ttl: Duration,
    pub force_refresh_min_interval: Duration,
    pub fetch_timeout: Duration,
    pub idle_cadence: Duration,
    pub live_cadence: Duration,
    pub max_backoff: Duration,
    pub multi_elimination_threshold: usize,
    /// Platforms whose legacy scoring table backs the fallback chain.
    pub legacy_scoring: Vec<PlatformSource>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let platform_a_api_url = required(&env_map, "PLATFORM_A_API_URL")?;
        let platform_b_api_url = required(&env_map, "PLATFORM_B_API_URL")?;
        let id_map_path = env_map
            .get("ID_MAP_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let current_week = parse_or(&env_map, "CURRENT_WEEK", 1u32, "must be a positive week number")?;
        if current_week == 0 {
            return Err(ConfigError::InvalidValue(
                "CURRENT_WEEK".to_string(),
                "must be a positive week number".to_string(),
            ));
        }

        let tracked_leagues = parse_tracked_leagues_from_map(&env_map, current_week)?;

        let snapshot_ttl = Duration::from_secs(parse_or(&env_map, "SNAPSHOT_TTL_SECS", 300u64, "must be a valid u64")?);
        let force_refresh_min_interval = Duration::from_millis(parse_or(
            &env_map,
            "FORCE_REFRESH_MIN_INTERVAL_MS",
            2000u64,
            "must be a valid u64",
        )?);
        let fetch_timeout = Duration::from_secs(parse_or(&env_map, "FETCH_TIMEOUT_SECS", 10u64, "must be a valid u64")?);
        let idle_cadence = Duration::from_secs(parse_or(&env_map, "IDLE_CADENCE_SECS", 300u64, "must be a valid u64")?);
        let live_cadence = Duration::from_secs(parse_or(&env_map, "LIVE_CADENCE_SECS", 30u64, "must be a valid u64")?);
        let max_backoff = Duration::from_secs(parse_or(&env_map, "MAX_BACKOFF_SECS", 900u64, "must be a valid u64")?);
        if live_cadence.is_zero() || idle_cadence.is_zero() {
            return Err(ConfigError::InvalidValue(
                "LIVE_CADENCE_SECS".to_string(),
                "cadences must be greater than zero".to_string(),
            ));
        }

        let multi_elimination_threshold = parse_or(
            &env_map,
            "MULTI_ELIMINATION_THRESHOLD",
            32usize,
            "must be a valid team count",
        )?;

        let legacy_scoring = match env_map.get("LEGACY_SCORING") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    PlatformSource::from_str(s)
                        .map_err(|e| ConfigError::InvalidValue("LEGACY_SCORING".to_string(), e))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Config {
            port,
            platform_a_api_url,
            platform_b_api_url,
            id_map_path,
            tracked_leagues,
            current_week,
            snapshot_ttl,
            force_refresh_min_interval,
            fetch_timeout,
            idle_cadence,
            live_cadence,
            max_backoff,
            multi_elimination_threshold,
            legacy_scoring,
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            ttl: self.snapshot_ttl,
            force_refresh_min_interval: self.force_refresh_min_interval,
            fetch_timeout: self.fetch_timeout,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            idle_cadence: self.idle_cadence,
            live_cadence: self.live_cadence,
            max_backoff: self.max_backoff,
        }
    }

    pub fn elimination_rules(&self) -> EliminationRules {
        EliminationRules {
            multi_elimination_threshold: self.multi_elimination_threshold,
        }
    }
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    message: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), message.to_string())),
        None => Ok(default),
    }
}

/// Parses one `platform:league_id[@scoring]` entry.
fn parse_tracked_entry(entry: &str, week: Week, key: &str) -> Result<TrackedLeague, ConfigError> {
    let (reference, scoring) = match entry.split_once('@') {
        Some((r, s)) => (r, Some(s)),
        None => (entry, None),
    };
    let league = LeagueRef::from_str(reference).map_err(|e| ConfigError::InvalidValue(key.to_string(), e))?;
    let bundled_scoring = scoring
        .map(BundledScoring::from_str)
        .transpose()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e))?;
    Ok(TrackedLeague {
        league,
        week,
        bundled_scoring,
    })
}

fn parse_tracked_leagues_from_map(
    env_map: &HashMap<String, String>,
    week: Week,
) -> Result<Vec<TrackedLeague>, ConfigError> {
    let (key, entries): (&str, Vec<String>) = if let Some(list) = env_map.get("TRACKED_LEAGUES") {
        ("TRACKED_LEAGUES", list.split(',').map(str::to_string).collect())
    } else if let Some(file_path) = env_map.get("TRACKED_LEAGUES_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "TRACKED_LEAGUES_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        (
            "TRACKED_LEAGUES_FILE",
            content
                .lines()
                .filter(|l| !l.trim_start().starts_with('#'))
                .map(str::to_string)
                .collect(),
        )
    } else {
        return Ok(Vec::new());
    };

    entries
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| parse_tracked_entry(s, week, key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("PLATFORM_A_API_URL".to_string(), "http://localhost:9001".to_string());
        map.insert("PLATFORM_B_API_URL".to_string(), "http://localhost:9002".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.snapshot_ttl, Duration::from_secs(300));
        assert_eq!(config.force_refresh_min_interval, Duration::from_millis(2000));
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.live_cadence, Duration::from_secs(30));
        assert_eq!(config.multi_elimination_threshold, 32);
        assert!(config.tracked_leagues.is_empty());
        assert!(config.legacy_scoring.is_empty());
    }

    #[test]
    fn test_missing_platform_a_url() {
        let mut env_map = setup_required_env();
        env_map.remove("PLATFORM_A_API_URL");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "PLATFORM_A_API_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_platform_b_url() {
        let mut env_map = setup_required_env();
        env_map.remove("PLATFORM_B_API_URL");
        match Config::from_env_map(env_map) {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "PLATFORM_B_API_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_tracked_leagues_with_scoring_hint() {
        let mut env_map = setup_required_env();
        env_map.insert("TRACKED_LEAGUES".to_string(), "a:123, b:456@half_ppr,".to_string());
        env_map.insert("CURRENT_WEEK".to_string(), "7".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.tracked_leagues.len(), 2);
        assert_eq!(config.tracked_leagues[0].league, LeagueRef::new(PlatformSource::A, "123"));
        assert_eq!(config.tracked_leagues[0].week, 7);
        assert_eq!(config.tracked_leagues[1].bundled_scoring, Some(BundledScoring::HalfPpr));
    }

    #[test]
    fn test_invalid_tracked_league() {
        let mut env_map = setup_required_env();
        env_map.insert("TRACKED_LEAGUES".to_string(), "c:1".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "TRACKED_LEAGUES"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_tracked_leagues_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# tracked leagues").unwrap();
        writeln!(file, "a:100").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "b:200@ppr").unwrap();

        let mut env_map = setup_required_env();
        env_map.insert(
            "TRACKED_LEAGUES_FILE".to_string(),
            file.path().to_string_lossy().to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.tracked_leagues.len(), 2);
        assert_eq!(config.tracked_leagues[1].bundled_scoring, Some(BundledScoring::FullPpr));
    }

    #[test]
    fn test_zero_week_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("CURRENT_WEEK".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CURRENT_WEEK"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_legacy_scoring_platforms() {
        let mut env_map = setup_required_env();
        env_map.insert("LEGACY_SCORING".to_string(), "A, b".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.legacy_scoring, vec![PlatformSource::A, PlatformSource::B]);
        assert_eq!(config.elimination_rules().multi_elimination_threshold, 32);
    }
}
