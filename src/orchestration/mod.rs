//! Glue between the store and its consumers: the refresh scheduler and the
//! query surface.

pub mod query;
pub mod scheduler;

pub use query::{LeagueQueries, PlayerBreakdown};
pub use scheduler::{
    ActivityHandle, Cadence, CadenceMachine, RefreshScheduler, RefreshState, SchedulerConfig,
    SchedulerHandle,
};
