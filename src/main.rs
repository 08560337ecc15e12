use anyhow::Context;
use leaguesync::datasource::{adapter_set, PlatformAdapter};
use leaguesync::engine::legacy_ruleset;
use leaguesync::orchestration::{ActivityHandle, LeagueQueries, RefreshScheduler};
use leaguesync::store::SystemClock;
use leaguesync::{api, Config, IdentityMapper, MatchupStore, PlatformAClient, PlatformBClient};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;
    let port = config.port;

    let identity = Arc::new(match &config.id_map_path {
        Some(path) => IdentityMapper::from_path(path).context("failed to load id map")?,
        None => IdentityMapper::bundled().context("failed to load bundled id map")?,
    });
    tracing::info!(entries = identity.len(), "Identity map loaded");

    let adapters: Vec<Arc<dyn PlatformAdapter>> = vec![
        Arc::new(PlatformAClient::new(
            config.platform_a_api_url.clone(),
            config.fetch_timeout,
            Arc::clone(&identity),
        )),
        Arc::new(PlatformBClient::new(
            config.platform_b_api_url.clone(),
            config.fetch_timeout,
            Arc::clone(&identity),
        )),
    ];
    let store = MatchupStore::new(
        adapter_set(adapters),
        Arc::new(SystemClock),
        config.store_config(),
    );
    for tracked in &config.tracked_leagues {
        store.track(tracked.clone());
    }

    let mut queries = LeagueQueries::new(store.clone(), Arc::clone(&identity))
        .with_elimination_rules(config.elimination_rules())
        .with_live_staleness(config.live_cadence);
    for platform in &config.legacy_scoring {
        queries = queries.with_legacy_table(*platform, legacy_ruleset(*platform));
    }

    let activity = ActivityHandle::new(true);
    let scheduler = RefreshScheduler::new(store, config.scheduler_config(), activity.clone());
    let scheduler_handle = scheduler.handle();
    let scheduler_task = scheduler.spawn();

    let app = api::create_router(api::AppState::new(queries, activity).with_scheduler(scheduler_handle));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    let served = axum::serve(listener, app).await;
    scheduler_task.abort();
    served.context("server error")
}
