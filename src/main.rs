//! Cafe Mood API
//!
//! REST API and CLI mapping synthetic mood profiles to cafe recommendations.

mod cli;
mod config;
mod dataset;
mod error;
mod features;
mod lookup;
mod model;
mod moods;
mod recommend;
mod report;
mod routes;
mod types;

use axum::{routing::get, routing::post, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cafe_mood_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::Recommend {
            mood,
            top_n,
            min_confidence,
            seed,
            catalog,
            format,
            source,
        } => cli::run_recommend(mood, top_n, min_confidence, seed, catalog, format, source).await,
        Commands::Moods {
            top_n,
            min_confidence,
            seed,
            catalog,
            format,
            source,
        } => cli::run_moods(top_n, min_confidence, seed, catalog, format, source).await,
        Commands::Ensemble {
            mood,
            samples,
            min_confidence,
            seed,
            format,
            source,
        } => cli::run_ensemble(mood, samples, min_confidence, seed, format, source).await,
        Commands::Explain {
            mood,
            seed,
            catalog,
            format,
            source,
        } => cli::run_explain(mood, seed, catalog, format, source).await,
        Commands::Ranges { dataset, format } => cli::run_ranges(dataset, format).await,
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    config.server.apply_overrides(host, port);

    tracing::info!("Configuration loaded");
    tracing::info!("Dataset path: {}", config.dataset.path);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    // Create application state
    let state = Arc::new(AppState::from_config(config)?);

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/model/info", get(routes::model_info))
        .route("/moods", get(routes::moods))
        .route("/recommend", post(routes::recommend))
        .route("/explain", post(routes::explain))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
