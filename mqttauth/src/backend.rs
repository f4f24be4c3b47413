//! Backend trait and chaining.

use std::sync::Arc;

use tracing::debug;

use crate::sqlite::SqliteBackend;
use crate::verdict::Verdict;

/// Result of a user lookup: the verdict plus the stored hash, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserLookup {
    /// Backend verdict.
    pub verdict: Verdict,
    /// Password hash on record. The broker verifies the password against it.
    pub hash: Option<String>,
}

impl UserLookup {
    /// Lookup result with no hash.
    pub fn verdict(verdict: Verdict) -> Self {
        Self {
            verdict,
            hash: None,
        }
    }
}

impl From<(Verdict, Option<String>)> for UserLookup {
    fn from((verdict, hash): (Verdict, Option<String>)) -> Self {
        Self { verdict, hash }
    }
}

/// Authentication and authorization backend consulted by the broker.
pub trait Backend: Send + Sync {
    /// Backend name, used in logs.
    fn name(&self) -> &str;

    /// Look up the credential hash for a connecting client.
    fn get_user(&self, username: &str, password: &str, client_id: &str) -> UserLookup;

    /// Decide whether `username` bypasses ACL checks.
    fn superuser(&self, username: &str) -> Verdict;

    /// Check access to `topic` with the broker's access mode.
    fn acl_check(&self, client_id: &str, username: &str, topic: &str, access: i32) -> Verdict;
}

impl Backend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn get_user(&self, username: &str, _password: &str, _client_id: &str) -> UserLookup {
        SqliteBackend::get_user(self, username).into()
    }

    fn superuser(&self, username: &str) -> Verdict {
        SqliteBackend::superuser(self, username)
    }

    fn acl_check(&self, client_id: &str, username: &str, topic: &str, access: i32) -> Verdict {
        SqliteBackend::acl_check(self, client_id, username, topic, access)
    }
}

/// Backends consulted in order until one has an opinion.
#[derive(Default, Clone)]
pub struct BackendChain {
    backends: Vec<Arc<dyn Backend>>,
}

impl BackendChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend.
    pub fn push(&mut self, backend: impl Backend + 'static) {
        self.backends.push(Arc::new(backend));
    }

    /// Append a backend (builder style).
    pub fn with(mut self, backend: impl Backend + 'static) -> Self {
        self.push(backend);
        self
    }

    /// Number of backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns true if the chain has no backends.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    fn first_opinion(&self, f: impl Fn(&dyn Backend) -> Verdict) -> Verdict {
        for backend in &self.backends {
            let verdict = f(backend.as_ref());
            if !verdict.is_defer() {
                debug!(backend = backend.name(), %verdict, "chain decided");
                return verdict;
            }
        }
        Verdict::Defer
    }
}

impl Backend for BackendChain {
    fn name(&self) -> &str {
        "chain"
    }

    /// The first backend that errors or yields a hash ends the lookup.
    fn get_user(&self, username: &str, password: &str, client_id: &str) -> UserLookup {
        for backend in &self.backends {
            let lookup = backend.get_user(username, password, client_id);
            if lookup.verdict == Verdict::Error || lookup.hash.is_some() {
                debug!(backend = backend.name(), username, "user claimed");
                return lookup;
            }
        }
        UserLookup::default()
    }

    fn superuser(&self, username: &str) -> Verdict {
        self.first_opinion(|b| b.superuser(username))
    }

    fn acl_check(&self, client_id: &str, username: &str, topic: &str, access: i32) -> Verdict {
        self.first_opinion(|b| b.acl_check(client_id, username, topic, access))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        verdict: Verdict,
        hash: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn new(name: &'static str, verdict: Verdict, hash: Option<&'static str>) -> Self {
            Self {
                name,
                verdict,
                hash,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Backend for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn get_user(&self, _: &str, _: &str, _: &str) -> UserLookup {
            self.calls.fetch_add(1, Ordering::SeqCst);
            UserLookup {
                verdict: self.verdict,
                hash: self.hash.map(str::to_string),
            }
        }
        fn superuser(&self, _: &str) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        }
        fn acl_check(&self, _: &str, _: &str, _: &str, _: i32) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        }
    }

    #[test]
    fn test_empty_chain_defers() {
        let chain = BackendChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.acl_check("c", "u", "t", 1), Verdict::Defer);
        assert_eq!(chain.superuser("u"), Verdict::Defer);
        assert_eq!(chain.get_user("u", "p", "c"), UserLookup::default());
    }

    #[test]
    fn test_first_opinion_wins() {
        let last = Fixed::new("last", Verdict::Error, None);
        let last_calls = Arc::clone(&last.calls);
        let chain = BackendChain::new()
            .with(Fixed::new("a", Verdict::Defer, None))
            .with(Fixed::new("b", Verdict::Allow, None))
            .with(last);

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.acl_check("c", "u", "t", 2), Verdict::Allow);
        assert_eq!(chain.superuser("u"), Verdict::Allow);
        assert_eq!(last_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_get_user_claimed_by_hash() {
        let chain = BackendChain::new()
            .with(Fixed::new("a", Verdict::Defer, None))
            .with(Fixed::new("b", Verdict::Defer, Some("H1")))
            .with(Fixed::new("c", Verdict::Defer, Some("H2")));

        let lookup = chain.get_user("alice", "pw", "c1");
        assert_eq!(lookup.verdict, Verdict::Defer);
        assert_eq!(lookup.hash.as_deref(), Some("H1"));
    }

    #[test]
    fn test_get_user_error_stops_chain() {
        let chain = BackendChain::new()
            .with(Fixed::new("a", Verdict::Error, None))
            .with(Fixed::new("b", Verdict::Defer, Some("H1")));

        assert_eq!(chain.get_user("alice", "pw", "c1"), UserLookup::verdict(Verdict::Error));
    }
}
