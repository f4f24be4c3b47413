//! Broker plug-in entry points.
//!
//! These mirror the five callbacks a broker auth plug-in exposes. Verdicts
//! cross this boundary as the broker's integer codes (see [`Verdict::code`]);
//! a `None` instance stands for the null handle returned by a failed init.

use tracing::error;

use crate::config::{Config, SqliteConfig};
use crate::error::Result;
use crate::sqlite::SqliteBackend;
use crate::verdict::Verdict;

/// Create a backend from the broker's option table.
///
/// A missing mandatory key is a fatal `Err`; the broker should abort. A
/// database that cannot be opened yields `Ok(None)` so the broker can carry on
/// with its other backends.
pub fn init(config: &Config) -> Result<Option<SqliteBackend>> {
    let config = SqliteConfig::from_config(config).map_err(|e| {
        error!("{}", e);
        e
    })?;
    // open() logs the reason.
    Ok(SqliteBackend::open(&config).ok())
}

/// Release a backend. Accepts the null handle.
pub fn destroy(backend: Option<SqliteBackend>) {
    if let Some(backend) = backend {
        backend.close();
    }
}

/// User lookup callback. Returns the verdict code and the stored hash.
///
/// The password is not inspected; the broker verifies it against the hash.
pub fn get_user(
    backend: Option<&SqliteBackend>,
    username: &str,
    _password: &str,
    _client_id: &str,
) -> (i32, Option<String>) {
    match backend {
        Some(b) => {
            let (verdict, hash) = b.get_user(username);
            (verdict.code(), hash)
        }
        None => (Verdict::Defer.code(), None),
    }
}

/// Superuser callback. Always defers.
pub fn superuser(backend: Option<&SqliteBackend>, username: &str) -> i32 {
    backend
        .map_or(Verdict::Defer, |b| b.superuser(username))
        .code()
}

/// ACL callback.
pub fn acl_check(
    backend: Option<&SqliteBackend>,
    client_id: &str,
    username: &str,
    topic: &str,
    access: i32,
) -> i32 {
    backend
        .map_or(Verdict::Defer, |b| b.acl_check(client_id, username, topic, access))
        .code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::verdict::ACCESS_READ;

    #[test]
    fn test_null_instance() {
        let defer = Verdict::Defer.code();
        assert_eq!(get_user(None, "alice", "pw", "c1"), (defer, None));
        assert_eq!(superuser(None, "alice"), defer);
        assert_eq!(acl_check(None, "c1", "alice", "a/b", ACCESS_READ), defer);
        destroy(None);
    }

    #[test]
    fn test_init_missing_key_is_fatal() {
        let config = Config::from_pairs([("dbpath", "/nonexistent/auth.db")]);
        assert!(matches!(init(&config), Err(Error::MissingConfig("sqliteuserquery"))));
    }

    #[test]
    fn test_init_open_failure_is_null() {
        let config = Config::from_pairs([
            ("dbpath", "/nonexistent/dir/auth.db"),
            ("sqliteuserquery", "SELECT pw FROM users WHERE name=?"),
        ]);
        assert!(init(&config).unwrap().is_none());
    }
}
