use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use hs_domain::error::Result;

use crate::id::SessionId;
use crate::store::Store;

/// Handle on one client's session data.
///
/// Holds no data itself: every call goes straight to the store, so two
/// handles with the same identifier always see each other's writes.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    store: Arc<dyn Store>,
}

impl Session {
    pub fn new(id: SessionId, store: Arc<dyn Store>) -> Self {
        Self { id, store }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(&self.id, key)
    }

    /// Typed read.  A value that does not deserialize as `T` reads as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.store.set(&self.id, key, value.into());
    }

    /// Typed write for anything serializable.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.store.set(&self.id, key, value);
        Ok(())
    }

    pub fn del(&self, key: &str) -> bool {
        self.store.del(&self.id, key)
    }

    /// Whether the store currently holds data for this session.
    pub fn exists(&self) -> bool {
        self.store.exist(&self.id)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}
