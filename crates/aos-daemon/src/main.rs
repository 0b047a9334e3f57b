//! aos-daemon entry point.
//!
//! Thin on purpose: tracing, config, the shared pool, middleware and the
//! HTTP server. Route handlers live in `routes.rs`; shared state in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use aos_daemon::{archive::RequestArchive, routes, state};
use aos_db::PgEntityStore;
use aos_reconcile::Reconciler;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = aos_config::load_from_env().context("config load failed")?;
    let cfg = loaded.service()?;
    let unused = aos_config::report_unused_keys(&loaded.config_json, aos_config::UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "unused config keys");
    }
    info!(config_hash = %loaded.config_hash, "config loaded");

    let db_url = aos_db::database_url_from_env(&cfg.db_url_env)?;
    let pool = aos_db::connect_lazy(&db_url, cfg.db_max_connections)?;

    // Boot continues on a failed probe; syncs return 503 until the database
    // is reachable.
    match aos_db::status(&pool).await {
        Ok(st) if st.has_entity_tables() => info!("database reachable"),
        Ok(st) => warn!(missing = ?st.missing_tables, "entity tables missing; run `aos db migrate`"),
        Err(e) => warn!(error = %format!("{e:#}"), "database probe failed"),
    }

    let reconciler = Reconciler::new(Arc::new(PgEntityStore::new(pool.clone())));
    let archive = cfg.archive_root.clone().map(RequestArchive::new);
    match &archive {
        Some(a) => info!(dir = %a.dir().display(), "request archive enabled"),
        None => info!("request archive disabled"),
    }

    let shared = Arc::new(state::AppState::new(reconciler, archive));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or(cfg.bind_addr);
    info!("aos-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    pool.close().await;
    info!("aos-daemon stopped");

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("AOS_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; shutting down");
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
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
