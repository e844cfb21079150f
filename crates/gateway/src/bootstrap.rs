//! Startup wiring shared by the server and the integration tests.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hs_domain::config::Config;
use hs_sessions::{BeforeReleaseListener, Session, SessionManager};

use crate::state::AppState;

/// Build the shared state: one session manager for the process lifetime.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let sessions = SessionManager::from_config(&config.sessions)?;

    let audit: Arc<dyn BeforeReleaseListener> = Arc::new(|session: &Session| {
        tracing::info!(session_id = %session.id().redacted(), "session released");
    });
    sessions.add_before_release_listener(audit);

    Ok(AppState {
        config,
        sessions: Arc::new(sessions),
    })
}

/// Spawn the session sweep loop.  It stops when `shutdown` is cancelled.
pub fn spawn_background_tasks(state: &AppState, shutdown: CancellationToken) -> JoinHandle<()> {
    let sessions = state.sessions.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = sessions.run(shutdown).await {
            tracing::warn!(error = %e, "session sweep exited with error");
        }
    });
    tracing::info!("background tasks spawned");
    handle
}
