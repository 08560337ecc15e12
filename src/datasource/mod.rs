//! Platform adapters: fetch raw league/matchup/box-score payloads and
//! normalize them into the unified domain model.

use crate::domain::{LeagueId, LeagueInfo, MatchupSnapshot, PlatformSource, RawStatRecord, ScoringRuleset, Week};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod platform_a;
pub mod platform_b;

pub use http::JsonClient;
pub use mock::MockAdapter;
pub use platform_a::PlatformAClient;
pub use platform_b::PlatformBClient;

/// One implementation per platform, same interface.
///
/// Adapters own no persistent state. Every player they emit has passed
/// through the identity mapper.
#[async_trait]
pub trait PlatformAdapter: Send + Sync + fmt::Debug {
    fn source(&self) -> PlatformSource;

    /// Fetch league metadata (name, status, teams, scoring when embedded).
    async fn fetch_league(&self, league_id: &LeagueId) -> Result<LeagueInfo, DataSourceError>;

    /// Fetch all matchups of `week`, fully normalized.
    ///
    /// A malformed matchup is skipped; it does not fail the batch.
    async fn fetch_matchups(
        &self,
        league_id: &LeagueId,
        week: Week,
    ) -> Result<Vec<MatchupSnapshot>, DataSourceError>;

    /// Fetch per-player raw stats for one matchup.
    async fn fetch_box_score(
        &self,
        league_id: &LeagueId,
        matchup_id: &str,
        week: Week,
    ) -> Result<Vec<RawStatRecord>, DataSourceError>;

    /// Fetch the league's scoring rules. `Ok(None)` when the platform does not
    /// expose them for this league.
    async fn fetch_scoring_settings(
        &self,
        league_id: &LeagueId,
    ) -> Result<Option<ScoringRuleset>, DataSourceError>;
}

/// Adapter registry keyed by platform.
pub type AdapterSet = HashMap<PlatformSource, Arc<dyn PlatformAdapter>>;

/// Build an [`AdapterSet`] from adapters, keyed by their own `source()`.
pub fn adapter_set(adapters: Vec<Arc<dyn PlatformAdapter>>) -> AdapterSet {
    adapters.into_iter().map(|a| (a.source(), a)).collect()
}

/// Error type for adapter operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataSourceError {
    /// Transport failure (connection refused, DNS, reset).
    #[error("Network error: {0}")]
    Network(String),
    /// The call exceeded its time budget.
    #[error("Timed out after {0}ms")]
    Timeout(u64),
    /// Non-success HTTP status.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    /// The payload could not be parsed.
    #[error("Decoding error: {0}")]
    Decoding(String),
    /// The platform asked us to slow down.
    #[error("Rate limited")]
    RateLimited,
    #[error("Not found: {0}")]
    NotFound(String),
}

impl DataSourceError {
    /// Failures worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            DataSourceError::Network(_) | DataSourceError::Timeout(_) => true,
            DataSourceError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DataSourceError::RateLimited)
    }
}
