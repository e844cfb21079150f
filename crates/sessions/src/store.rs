//! The storage contract every session backend satisfies.
//!
//! Each operation is scoped to exactly one identifier; nothing spans
//! sessions.  Misses are `None`, never errors, and deletions are idempotent.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use hs_domain::error::Result;

use crate::id::SessionId;

/// Key/value storage for session data, keyed by [`SessionId`].
///
/// Implementations must not serialize unrelated sessions behind one another:
/// an operation on one identifier should never wait on work for another.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read `key` from the session, refreshing its expiration.
    fn get(&self, id: &SessionId, key: &str) -> Option<Value>;

    /// Upsert `key`, creating the session on first write.
    fn set(&self, id: &SessionId, key: &str, value: Value);

    /// Create an empty session, replacing any existing one for `id`.
    fn add(&self, id: &SessionId);

    /// Remove one key.  Always returns `true`.
    fn del(&self, id: &SessionId, key: &str) -> bool;

    /// Remove the whole session.  Always returns `true`.
    fn del_all(&self, id: &SessionId) -> bool;

    fn exist(&self, id: &SessionId) -> bool;

    /// Background maintenance (expiration sweeping) until `shutdown` fires.
    ///
    /// Backends that need no maintenance return immediately; callers must not
    /// assume memory is reclaimed unless the backend documents a sweep.
    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let _ = shutdown;
        Ok(())
    }
}
