mod agent;
mod applications;
mod audit;
mod auth;
mod candidates;
mod config;
mod db;
mod errors;
mod extract;
mod jobs;
mod matching;
mod models;
mod routes;
mod state;
mod storage;

use anyhow::Result;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agent::AgentGateway;
use crate::audit::sink::{AuditSink, PgAuditSink};
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::ResumeStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hiring API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs pending migrations)
    let db = create_pool(&config.database_url, config.db_max_connections).await?;

    let resumes = ResumeStore::from_config(&config).await;
    if resumes.is_none() {
        warn!("S3_BUCKET is not set; résumé upload is disabled");
    }

    let agent = AgentGateway::from_config(&config.agent).await?;
    info!("Agent gateway ready (backend: {})", agent.backend());

    let audit: Arc<dyn AuditSink> = Arc::new(PgAuditSink::new(db.clone()));

    let cors = cors_layer(&config.cors_allowed_origins)?;

    let state = AppState {
        db,
        resumes,
        agent,
        config: config.clone(),
        audit,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Explicit origins when configured, otherwise permissive for local development.
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty; allowing any origin");
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}
