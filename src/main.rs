use std::net::SocketAddr;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use sequencer::config::Config;
use sequencer::engine;
use sequencer::state::SharedState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting Sequencer");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations applied");

    let addr = SocketAddr::new(config.host, config.port);
    let tick_seconds = config.tick_seconds;

    let state = sequencer::build_state(pool, config);

    if tick_seconds > 0 {
        tokio::spawn(run_ticker(state.clone(), tick_seconds));
    }

    let app = sequencer::build_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Built-in periodic trigger for single-node deploys. The engine stays
/// correct under overlap with external triggers, so no coordination is
/// needed here.
async fn run_ticker(state: SharedState, tick_seconds: u64) {
    let Some(gateway) = state.gateway.clone() else {
        tracing::warn!("Ticker disabled: no delivery gateway configured");
        return;
    };

    let opts = state.config.engine_options();
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_seconds));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!("Sequence ticker started (every {tick_seconds}s)");

    loop {
        interval.tick().await;
        match engine::process_due_batch(&state.pool, gateway.as_ref(), &opts, Utc::now()).await {
            Ok(summary) if summary.total > 0 => {
                tracing::info!(
                    "Tick: {} processed, {} errors",
                    summary.processed,
                    summary.errors
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Tick failed to claim batch: {e}"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
