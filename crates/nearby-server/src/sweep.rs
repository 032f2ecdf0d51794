use std::time::Duration;

use tracing::info;

use nearby_auth::SessionStore;

/// Background task that drops expired sessions from the session table.
pub async fn run_session_sweep(sessions: SessionStore, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let purged = sessions.purge_expired();
        if purged > 0 {
            info!("Session sweep: purged {} expired sessions ({} active)", purged, sessions.len());
        }
    }
}
