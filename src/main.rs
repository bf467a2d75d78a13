mod config;
mod errors;
mod execution;
mod feeds;
mod models;
mod replay;
mod server;
mod state;

use crate::models::black_scholes::BlackScholesEuropean;
use crate::state::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("option replay simulator starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let provider = feeds::build_provider(&cfg);
    let pricer = Arc::new(BlackScholesEuropean::new());
    let app_state = AppState::new(cfg.clone(), provider, pricer);

    // Replay ticker (fixed cadence; idle ticks are no-ops)
    let ticker_state = app_state.clone();
    tokio::spawn(async move {
        replay::run_replay_ticker(ticker_state).await;
    });

    let app = server::router(app_state);

    let addr = format!("0.0.0.0:{}", cfg.server_port);
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}
