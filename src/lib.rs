pub mod api;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod identity;
pub mod orchestration;
pub mod store;

pub use config::Config;
pub use datasource::{
    DataSourceError, MockAdapter, PlatformAClient, PlatformAdapter, PlatformBClient,
};
pub use domain::{
    CanonicalPlayerId, CanonicalTeamId, LeagueId, LeagueRef, MatchupSnapshot, PlatformSource,
    ScoreBreakdown, TeamRanking, Week,
};
pub use error::AppError;
pub use identity::IdentityMapper;
pub use orchestration::{ActivityHandle, LeagueQueries, RefreshScheduler};
pub use store::{MatchupStore, StoreConfig, StoreError, StoreRead};
