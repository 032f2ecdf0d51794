mod config;
mod sweep;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use nearby_api::proximity::ProximityConfig;
use nearby_api::state::AppStateInner;
use nearby_auth::{Passwords, SessionConfig, SessionStore};
use nearby_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nearby=debug,nearby_api=debug,nearby_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::load()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    let sessions = SessionStore::new(SessionConfig {
        ttl: config.session_ttl,
    });
    match config.session_ttl {
        Some(ttl) => info!("Sessions expire after {} hours", ttl.num_hours()),
        None => info!("Session expiry disabled"),
    }

    // Background session sweep
    tokio::spawn(sweep::run_session_sweep(sessions.clone(), config.session_sweep_secs));

    let proximity = ProximityConfig {
        room_radius_m: config.room_radius_m,
        suggestion_radius_m: config.suggestion_radius_m,
    };
    info!(
        "Proximity radii: rooms {} m, suggestions {} m",
        proximity.room_radius_m, proximity.suggestion_radius_m
    );

    let state = AppStateInner::new(db, sessions, Passwords::new()?, proximity);
    let app = nearby_api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Nearby server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());
        match sigterm {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
