//! Session lifecycle hooks.
//!
//! Listeners are registered by identity: registering the same `Arc` twice is
//! a no-op, and removal matches on the same pointer.  They fire in
//! registration order, outside the registry lock, so a listener may register
//! or remove listeners itself.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::session::Session;

/// Called after the manager hands out a session for a request.
pub trait AfterCreatedListener: Send + Sync {
    fn on_after_created(&self, session: &Session);
}

/// Called before a session's data is purged by invalidation.
pub trait BeforeReleaseListener: Send + Sync {
    fn on_before_release(&self, session: &Session);
}

impl<F> AfterCreatedListener for F
where
    F: Fn(&Session) + Send + Sync,
{
    fn on_after_created(&self, session: &Session) {
        self(session)
    }
}

impl<F> BeforeReleaseListener for F
where
    F: Fn(&Session) + Send + Sync,
{
    fn on_before_release(&self, session: &Session) {
        self(session)
    }
}

/// Ordered set of listeners keyed by `Arc` identity.
pub(crate) struct ListenerSet<L: ?Sized> {
    entries: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    /// Returns `false` if this exact listener was already registered.
    pub(crate) fn insert(&self, listener: Arc<L>) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|l| same(l, &listener)) {
            return false;
        }
        entries.push(listener);
        true
    }

    pub(crate) fn remove(&self, listener: &Arc<L>) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|l| !same(l, listener));
        entries.len() != before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries.read().clone()
    }
}

/// Pointer identity, ignoring vtable metadata.
fn same<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct N(&'static str);

    impl Named for N {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    #[test]
    fn duplicates_collapse() {
        let set: ListenerSet<dyn Named> = ListenerSet::default();
        let a: Arc<dyn Named> = Arc::new(N("a"));
        assert!(set.insert(a.clone()));
        assert!(!set.insert(a.clone()));
        assert_eq!(set.len(), 1);

        // Same behaviour, different identity.
        assert!(set.insert(Arc::new(N("a"))));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn snapshot_keeps_registration_order() {
        let set: ListenerSet<dyn Named> = ListenerSet::default();
        for name in ["first", "second", "third"] {
            set.insert(Arc::new(N(name)));
        }
        let names: Vec<_> = set.snapshot().iter().map(|l| l.name()).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[test]
    fn remove_by_identity() {
        let set: ListenerSet<dyn Named> = ListenerSet::default();
        let a: Arc<dyn Named> = Arc::new(N("a"));
        let b: Arc<dyn Named> = Arc::new(N("b"));
        set.insert(a.clone());
        set.insert(b.clone());

        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        let names: Vec<_> = set.snapshot().iter().map(|l| l.name()).collect();
        assert_eq!(names, ["b"]);
    }
}
