mod config;
mod db;
mod frame;
mod realtime;
mod routes;
mod services;
mod state;

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::realtime::RealtimeConfig;
use crate::realtime::feed::PgChangeFeed;
use crate::services::dashboard::DashboardSink;
use crate::services::{profile, session};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = match config::ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let pool = match db::init_pool(&config.database_url, config.db_max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "database init failed");
            return ExitCode::FAILURE;
        }
    };

    if let Some((username, password)) = &config.bootstrap_admin {
        match profile::bootstrap_admin(&pool, username, password).await {
            Ok(Some(id)) => tracing::info!(%id, %username, "bootstrap admin created"),
            Ok(None) => tracing::debug!("profiles exist; bootstrap admin skipped"),
            Err(e) => tracing::warn!(error = %e, "bootstrap admin failed"),
        }
    }

    match session::purge_expired(&pool).await {
        Ok(purged) if purged > 0 => tracing::info!(purged, "expired sessions purged"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "session purge failed"),
    }

    let port = config.port;
    let state = state::AppState::new(pool.clone(), config);

    let sink = DashboardSink::new(pool.clone(), state.hub.clone(), state.snapshot.clone());
    let handle = realtime::subscription::spawn(PgChangeFeed::new(pool), Arc::new(sink), RealtimeConfig::from_env());
    let state = state.with_realtime(&handle);

    let app = routes::app(state);
    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %port, "failed to bind");
            handle.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%port, "ledgerdesk listening");
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
    handle.shutdown().await;

    if let Err(e) = served {
        tracing::error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
