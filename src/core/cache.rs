//! Per-session cache of resolved stream URLs
//!
//! [`ResolutionCache`] is an immutable snapshot: `upsert` returns a new value and
//! never touches the old one, so a reader holding a snapshot can never observe a
//! half-written state. [`SessionCache`] is the shared container a presentation
//! session owns; it swaps snapshots in atomically and notifies subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Callback used by the resolver to write `(identity, url)` into a cache it does not own
pub type Upsert = Arc<dyn Fn(String, String) + Send + Sync>;

/// Immutable map from variant identity to resolved URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionCache {
    entries: Arc<HashMap<String, String>>,
}

impl ResolutionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the resolved URL for an identity
    pub fn lookup(&self, identity: &str) -> Option<&str> {
        self.entries.get(identity).map(String::as_str)
    }

    /// Return a new cache with `identity` set to `url`; `self` is left untouched
    pub fn upsert(&self, identity: impl Into<String>, url: impl Into<String>) -> Self {
        let mut next = HashMap::with_capacity(self.entries.len() + 1);
        next.extend(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        next.insert(identity.into(), url.into());
        Self {
            entries: Arc::new(next),
        }
    }

    /// Number of resolved entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared, atomically swapped cache for one presentation session
#[derive(Clone)]
pub struct SessionCache {
    tx: Arc<watch::Sender<ResolutionCache>>,
}

impl SessionCache {
    /// Create a fresh cache namespace
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ResolutionCache::new());
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot; cheap to clone and never changes underneath the caller
    pub fn snapshot(&self) -> ResolutionCache {
        self.tx.borrow().clone()
    }

    /// Look up an identity in the current snapshot
    pub fn lookup(&self, identity: &str) -> Option<String> {
        self.tx.borrow().lookup(identity).map(str::to_string)
    }

    /// Replace the current snapshot with `f(current)` in one atomic step
    pub fn apply<F>(&self, f: F)
    where
        F: FnOnce(&ResolutionCache) -> ResolutionCache,
    {
        self.tx.send_modify(|current| {
            let next = f(current);
            *current = next;
        });
    }

    /// Write one entry
    pub fn upsert(&self, identity: impl Into<String>, url: impl Into<String>) {
        let (identity, url) = (identity.into(), url.into());
        self.apply(move |current| current.upsert(identity, url));
    }

    /// Callback handed to the resolver
    pub fn updater(&self) -> Upsert {
        let cache = self.clone();
        Arc::new(move |identity: String, url: String| cache.upsert(identity, url))
    }

    /// Receive a notification after every write
    pub fn subscribe(&self) -> watch::Receiver<ResolutionCache> {
        self.tx.subscribe()
    }

    /// Check whether two handles share the same namespace
    pub fn same_session(&self, other: &SessionCache) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("entries", &self.tx.borrow().len())
            .finish()
    }
}
