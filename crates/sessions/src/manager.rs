//! Per-request session resolution and invalidation.
//!
//! One [`SessionManager`] is built at startup and shared for the life of the
//! process.  For each request it reads the identifier via the [`Transfer`],
//! keeps it if the [`IdGenerator`] vouches for it or mints (and sends back) a
//! new one otherwise, then binds a [`Session`] to the store.

use std::sync::Arc;

use http::request::Parts;
use http::HeaderMap;
use tokio_util::sync::CancellationToken;

use hs_domain::config::SessionsConfig;
use hs_domain::error::Result;
use hs_domain::trace::TraceEvent;

use crate::generator::{random_key, HmacGenerator, IdGenerator};
use crate::listener::{AfterCreatedListener, BeforeReleaseListener, ListenerSet};
use crate::memory::MemoryStore;
use crate::session::Session;
use crate::store::Store;
use crate::transfer::{CookieTransfer, Transfer};

pub struct SessionManager {
    store: Arc<dyn Store>,
    generator: Arc<dyn IdGenerator>,
    transfer: Arc<dyn Transfer>,
    after_created: ListenerSet<dyn AfterCreatedListener>,
    before_release: ListenerSet<dyn BeforeReleaseListener>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn Store>,
        generator: Arc<dyn IdGenerator>,
        transfer: Arc<dyn Transfer>,
    ) -> Self {
        Self {
            store,
            generator,
            transfer,
            after_created: ListenerSet::default(),
            before_release: ListenerSet::default(),
        }
    }

    /// Assemble the stock stack: memory store, HMAC generator and cookie
    /// transfer.
    ///
    /// The signing key is read from the env var named by `key_env`; when it
    /// is unset or empty a random key is used and identifiers will not
    /// survive a restart.
    pub fn from_config(config: &SessionsConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::from_config(config));
        let transfer = Arc::new(CookieTransfer::from_config(config)?);

        let key = match std::env::var(&config.key_env) {
            Ok(k) if !k.is_empty() => k.into_bytes(),
            _ => {
                tracing::warn!(
                    key_env = %config.key_env,
                    "session signing key not set, using a random per-process key"
                );
                random_key(32)
            }
        };
        let mut generator = HmacGenerator::new(key);
        if let Some(max_age) = config.id_max_age() {
            generator = generator.with_max_age(max_age);
        }
        let generator = Arc::new(generator);

        tracing::info!(
            cookie = %transfer.name(),
            ttl_secs = config.ttl_secs,
            sweep_interval_secs = config.sweep_interval_secs,
            "session manager configured"
        );

        Ok(Self::new(store, generator, transfer))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Resolve the session for `request`, writing a new identifier into
    /// `response` if one had to be minted.
    ///
    /// Fails only when the identifier carrier on the request is unreadable.
    pub fn session(&self, request: &Parts, response: &mut HeaderMap) -> Result<Session> {
        let presented = match self.transfer.get(request) {
            Ok(id) => id,
            Err(e) => {
                TraceEvent::TransferRejected {
                    carrier: "cookie".into(),
                    reason: e.to_string(),
                }
                .emit();
                return Err(e.into());
            }
        };

        let (id, is_new) = match presented {
            Some(id) if self.generator.is_valid(&id) => (id, false),
            _ => {
                let id = self.generator.generate(request);
                self.store.add(&id);
                self.transfer.set(response, &id);
                TraceEvent::SessionIssued {
                    session_id: id.redacted(),
                }
                .emit();
                (id, true)
            }
        };

        let session = Session::new(id, self.store.clone());
        for listener in self.after_created.snapshot() {
            listener.on_after_created(&session);
        }

        TraceEvent::SessionResolved {
            session_id: session.id().redacted(),
            is_new,
        }
        .emit();

        Ok(session)
    }

    /// Explicit logout: notify before-release listeners, purge the session's
    /// data and clear the identifier on the client.
    pub fn invalidate(&self, response: &mut HeaderMap, session: &Session) {
        let listeners = self.before_release.snapshot();
        for listener in &listeners {
            listener.on_before_release(session);
        }
        self.store.del_all(session.id());
        self.transfer.clear(response);

        TraceEvent::SessionInvalidated {
            session_id: session.id().redacted(),
            listeners: listeners.len(),
        }
        .emit();
    }

    /// Drive the store's background maintenance until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.store.run(shutdown).await
    }

    // ── Listener registration ───────────────────────────────────────────

    /// Returns `false` if this listener was already registered.
    pub fn add_after_created_listener(&self, listener: Arc<dyn AfterCreatedListener>) -> bool {
        self.after_created.insert(listener)
    }

    pub fn remove_after_created_listener(&self, listener: &Arc<dyn AfterCreatedListener>) -> bool {
        self.after_created.remove(listener)
    }

    /// Returns `false` if this listener was already registered.
    pub fn add_before_release_listener(&self, listener: Arc<dyn BeforeReleaseListener>) -> bool {
        self.before_release.insert(listener)
    }

    pub fn remove_before_release_listener(&self, listener: &Arc<dyn BeforeReleaseListener>) -> bool {
        self.before_release.remove(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::id::SessionId;

    /// Accepts any non-empty id and mints sequential ones.
    struct SeqGenerator(AtomicUsize);

    impl IdGenerator for SeqGenerator {
        fn is_valid(&self, id: &SessionId) -> bool {
            id.as_str().starts_with("seq-")
        }

        fn generate(&self, _request: &Parts) -> SessionId {
            SessionId::new(format!("seq-{}", self.0.fetch_add(1, Ordering::SeqCst)))
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(MemoryStore::default()),
            Arc::new(SeqGenerator(AtomicUsize::new(0))),
            Arc::new(CookieTransfer::new("sid", std::time::Duration::from_secs(60))),
        )
    }

    fn request(cookie: Option<&str>) -> Parts {
        let mut builder = http::Request::builder().uri("/");
        if let Some(c) = cookie {
            builder = builder.header(http::header::COOKIE, c);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn invalid_id_is_replaced() {
        let mgr = manager();
        let mut headers = HeaderMap::new();
        let session = mgr.session(&request(Some("sid=forged")), &mut headers).unwrap();

        assert_eq!(session.id().as_str(), "seq-0");
        assert!(session.exists());
        assert_eq!(headers.get_all(http::header::SET_COOKIE).iter().count(), 1);
    }

    #[test]
    fn after_created_fires_once_per_resolution() {
        let mgr = manager();
        let count = Arc::new(AtomicUsize::new(0));
        let listener: Arc<dyn AfterCreatedListener> = {
            let count = count.clone();
            Arc::new(move |_: &Session| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(mgr.add_after_created_listener(listener.clone()));
        assert!(!mgr.add_after_created_listener(listener.clone()));

        let mut headers = HeaderMap::new();
        mgr.session(&request(None), &mut headers).unwrap();
        mgr.session(&request(Some("sid=seq-0")), &mut headers).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(mgr.remove_after_created_listener(&listener));
        mgr.session(&request(None), &mut headers).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transfer_error_is_surfaced() {
        let mgr = manager();
        let mut headers = HeaderMap::new();
        let err = mgr
            .session(&request(Some("sid=%FF")), &mut headers)
            .unwrap_err();
        assert!(matches!(err, hs_domain::error::Error::Transfer(_)));
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn run_delegates_to_store() {
        let mgr = manager();
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        mgr.run(shutdown).await.unwrap();
    }
}
