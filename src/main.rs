//! Service entry point: config, database, HTTP API, and the daily cycle
//! watcher (or a single generation pass with RUN_ONCE=true).

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use daily_picks::analyst::OddsHeuristicAnalyst;
use daily_picks::api::{self, AppState};
use daily_picks::config::Config;
use daily_picks::generator::{Generator, JobState};
use daily_picks::odds::{OddsClient, OddsGateway, ScheduleCache};
use daily_picks::store::{self, BetHistoryStore, PicksStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("daily_picks=info".parse().expect("valid directive")),
        )
        .init();

    info!("Daily Picks Service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = store::connect_with_retry(&config.database_url, 5).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let odds: Arc<dyn OddsGateway> = Arc::new(OddsClient::new(config.odds_api_key.clone())?);
    let generator = Arc::new(Generator::new(
        pool.clone(),
        odds.clone(),
        Arc::new(OddsHeuristicAnalyst),
        config.business_timezone,
        config.system_user_email.clone(),
    ));
    let job_state = JobState::new();

    let run_once = config.run_once;
    let addr = format!("0.0.0.0:{}", config.port);
    let watch_interval = Duration::from_secs(config.watch_interval_seconds);

    let state = Arc::new(AppState {
        picks: PicksStore::new(pool.clone()),
        history: BetHistoryStore::new(pool.clone()),
        pool,
        odds,
        generator: generator.clone(),
        schedule_cache: ScheduleCache::new(Duration::from_secs(config.schedule_cache_seconds)),
        job_state: job_state.clone(),
        config,
    });

    let app = api::router(state);
    info!("API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // One-shot mode (manual trigger): generate for the current cycle, exit.
    if run_once {
        info!("Running in one-shot mode (RUN_ONCE=true)");
        match generator.run_cycle(chrono::Utc::now()).await {
            Ok(report) => {
                info!(
                    "One-shot generation completed: {} generated, {} failed",
                    report.generated, report.failed
                );
            }
            Err(e) => {
                error!("One-shot generation failed: {:?}", e);
                return Err(e.into());
            }
        }
        return Ok(());
    }

    let watcher = tokio::spawn(generator.watch(job_state, watch_interval));

    // Handle shutdown gracefully
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Server error: {:?}", e);
            }
        }
        _ = ctrl_c => {
            info!("Shutting down...");
        }
    }

    watcher.abort();
    Ok(())
}
