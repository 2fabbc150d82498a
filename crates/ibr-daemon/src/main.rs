//! ibr-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads config,
//! starts the persistence writer, builds one gateway session per slot,
//! wires middleware, and starts the HTTP server.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use ibr_daemon::{routes, state};
use ibr_session::{Session, WsTransport};
use tokio::sync::mpsc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = ibr_config::load_from_env().context("config load failed")?;
    let cfg = loaded.config;
    info!(config_hash = %loaded.config_hash, slots = cfg.gateway.total_slots(), "config loaded");

    let db = match &cfg.database_url {
        Some(url) => {
            let pool = ibr_db::connect(url).await?;
            ibr_db::migrate(&pool).await?;
            Some(pool)
        }
        None => None,
    };
    let (persist_tx, persist_rx) = mpsc::unbounded_channel();
    let _writer = ibr_db::spawn_persistence_writer(db, persist_rx);

    let url = cfg.gateway.url();
    let sessions: Vec<Arc<Session>> = (0..cfg.gateway.total_slots())
        .map(|slot| {
            Arc::new(Session::new(
                slot,
                cfg.gateway.client_id_for(slot),
                Arc::new(WsTransport::new(url.clone())),
            ))
        })
        .collect();

    let shared = Arc::new(state::AppState::from_sessions(
        sessions,
        &cfg,
        Some(persist_tx),
        loaded.config_hash,
    ));
    // Failures are logged; each slot reconnects when it is next leased.
    shared.gateway.pool().connect_all().await;

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr: SocketAddr = cfg
        .http
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid http bind address {}", cfg.http.bind_addr()))?;
    info!(gateway = %url, "ibr-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    shared.gateway.pool().disconnect_all().await;
    info!("ibr-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
