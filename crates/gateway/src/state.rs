use std::sync::Arc;

use hs_domain::config::Config;
use hs_sessions::SessionManager;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
}
