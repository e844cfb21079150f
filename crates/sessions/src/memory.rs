//! In-process session store.
//!
//! Two lock levels: the top-level map (identifier → node) is only write-locked
//! to insert or remove whole nodes, and every node carries its own locks for
//! its key/value bag and deadline.  Ordinary reads and writes to an existing
//! session only touch that session's node, so unrelated sessions never contend.
//!
//! A node whose deadline has passed is dead: it is never refreshed again, reads
//! see it as absent, and the next write replaces it with a fresh node.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use hs_domain::config::SessionsConfig;
use hs_domain::error::Result;
use hs_domain::trace::TraceEvent;

use crate::id::SessionId;
use crate::store::Store;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session node
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct SessionNode {
    values: RwLock<HashMap<String, Value>>,
    deadline: Mutex<Instant>,
}

impl SessionNode {
    fn new(ttl: Duration) -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            deadline: Mutex::new(Instant::now() + ttl),
        }
    }

    fn with_entry(ttl: Duration, key: &str, value: Value) -> Self {
        let mut node = Self::new(ttl);
        node.values.get_mut().insert(key.to_owned(), value);
        node
    }

    fn is_expired(&self, now: Instant) -> bool {
        *self.deadline.lock() <= now
    }

    /// Push the deadline out to `now + ttl`.  Returns `false` (and leaves the
    /// node untouched) if it has already expired.
    fn touch(&self, ttl: Duration) -> bool {
        let mut deadline = self.deadline.lock();
        let now = Instant::now();
        if *deadline <= now {
            return false;
        }
        *deadline = now + ttl;
        true
    }

    /// Refresh and upsert.  Hands the value back if the node is dead.
    fn write(&self, ttl: Duration, key: &str, value: Value) -> std::result::Result<(), Value> {
        if !self.touch(ttl) {
            return Err(value);
        }
        self.values.write().insert(key.to_owned(), value);
        Ok(())
    }

    fn remaining(&self) -> Option<Duration> {
        let deadline = *self.deadline.lock();
        let now = Instant::now();
        (deadline > now).then(|| deadline - now)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Concurrent in-memory [`Store`] with sliding expiration.
pub struct MemoryStore {
    nodes: RwLock<HashMap<SessionId, Arc<SessionNode>>>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            ttl,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn from_config(config: &SessionsConfig) -> Self {
        Self::new(config.ttl()).with_sweep_interval(config.sweep_interval())
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of nodes held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Time left before the session expires, or `None` if it is absent or
    /// already expired.
    pub fn remaining_ttl(&self, id: &SessionId) -> Option<Duration> {
        self.node(id)?.remaining()
    }

    /// Remove every expired node.  Returns how many were removed.
    ///
    /// Deadlines are checked without holding the top-level lock; the write
    /// lock is only taken for the removals themselves.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let candidates: Vec<SessionId> = {
            let snapshot: Vec<(SessionId, Arc<SessionNode>)> = self
                .nodes
                .read()
                .iter()
                .map(|(id, node)| (id.clone(), node.clone()))
                .collect();
            snapshot
                .into_iter()
                .filter(|(_, node)| node.is_expired(now))
                .map(|(id, _)| id)
                .collect()
        };
        if candidates.is_empty() {
            return 0;
        }

        let mut nodes = self.nodes.write();
        let mut removed = 0;
        for id in candidates {
            // The entry may have been replaced by a fresh node since the scan.
            if nodes.get(&id).is_some_and(|node| node.is_expired(now)) {
                nodes.remove(&id);
                removed += 1;
            }
        }
        removed
    }

    /// Fetch the node reference, holding the top-level read lock only for the
    /// lookup.
    fn node(&self, id: &SessionId) -> Option<Arc<SessionNode>> {
        self.nodes.read().get(id).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn get(&self, id: &SessionId, key: &str) -> Option<Value> {
        let node = self.node(id)?;
        if !node.touch(self.ttl) {
            return None;
        }
        let values = node.values.read();
        values.get(key).cloned()
    }

    fn set(&self, id: &SessionId, key: &str, value: Value) {
        // Fast path: live node, only its own locks are taken.
        let value = match self.node(id) {
            Some(node) => match node.write(self.ttl, key, value) {
                Ok(()) => return,
                Err(value) => value,
            },
            None => value,
        };

        // Slow path: first write for this id, or the node expired.
        let mut nodes = self.nodes.write();
        let value = match nodes.get(id) {
            Some(node) => match node.write(self.ttl, key, value) {
                Ok(()) => return,
                Err(value) => value,
            },
            None => value,
        };
        nodes.insert(id.clone(), Arc::new(SessionNode::with_entry(self.ttl, key, value)));
    }

    fn add(&self, id: &SessionId) {
        let node = Arc::new(SessionNode::new(self.ttl));
        self.nodes.write().insert(id.clone(), node);
    }

    fn del(&self, id: &SessionId, key: &str) -> bool {
        if let Some(node) = self.node(id) {
            node.values.write().remove(key);
        }
        true
    }

    fn del_all(&self, id: &SessionId) -> bool {
        self.nodes.write().remove(id);
        true
    }

    fn exist(&self, id: &SessionId) -> bool {
        self.node(id)
            .is_some_and(|node| !node.is_expired(Instant::now()))
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        // `interval` panics on a zero period.
        let mut interval = tokio::time::interval(self.sweep_interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = self.sweep_interval.as_millis() as u64,
            ttl_secs = self.ttl.as_secs(),
            "session sweep started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let started = Instant::now();
                    let removed = self.sweep_expired();
                    if removed > 0 {
                        TraceEvent::SessionsSwept {
                            removed,
                            remaining: self.len(),
                            duration_ms: started.elapsed().as_millis() as u64,
                        }
                        .emit();
                    }
                }
            }
        }

        tracing::info!(sessions = self.len(), "session sweep stopped");
        Ok(())
    }
}
