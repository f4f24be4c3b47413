//! SQLite backend instance.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, error, info, warn};

use crate::config::SqliteConfig;
use crate::error::Result;
use crate::expand::{Placeholders, TopicExpander};
use crate::stmt::{PreparedQuery, QueryStats, column_text, is_transient};
use crate::topic::{MqttTopicMatcher, TopicMatcher};
use crate::verdict::Verdict;

/// Maximum step attempts of a user lookup before giving up.
const USER_LOOKUP_ATTEMPTS: usize = 5;

/// Connection plus the handles that run against it. Always accessed under
/// the instance mutex, so a statement is never stepped by two callers.
struct Inner {
    conn: Connection,
    user: Option<PreparedQuery>,
    acl: Option<PreparedQuery>,
}

/// Authentication and ACL backend over a read-only SQLite database.
pub struct SqliteBackend {
    inner: Mutex<Inner>,
    db_path: PathBuf,
    matcher: Arc<dyn TopicMatcher>,
    expander: Arc<dyn TopicExpander>,
}

impl fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SqliteBackend`].
pub struct SqliteBackendBuilder {
    db_path: PathBuf,
    user_query: Option<String>,
    acl_query: Option<String>,
    matcher: Arc<dyn TopicMatcher>,
    expander: Arc<dyn TopicExpander>,
}

impl SqliteBackendBuilder {
    /// Create a builder for the database at `db_path`.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            user_query: None,
            acl_query: None,
            matcher: Arc::new(MqttTopicMatcher),
            expander: Arc::new(Placeholders),
        }
    }

    /// Set the user lookup query. Empty queries are ignored.
    pub fn user_query(mut self, query: impl Into<String>) -> Self {
        self.user_query = non_empty(query.into());
        self
    }

    /// Set the ACL query. Empty queries are ignored.
    pub fn acl_query(mut self, query: impl Into<String>) -> Self {
        self.acl_query = non_empty(query.into());
        self
    }

    /// Use the broker's topic predicate instead of [`MqttTopicMatcher`].
    pub fn matcher(mut self, matcher: impl TopicMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    /// Use a custom placeholder expander instead of [`Placeholders`].
    pub fn expander(mut self, expander: impl TopicExpander + 'static) -> Self {
        self.expander = Arc::new(expander);
        self
    }

    /// Open the database and prepare the configured queries.
    ///
    /// Fails only if the database cannot be opened. A query that does not
    /// prepare is logged and retried on first use.
    pub fn open(self) -> Result<SqliteBackend> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_SHARED_CACHE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.db_path, flags).map_err(|e| {
            error!("failed to open {}: {}", self.db_path.display(), e);
            e
        })?;
        // No busy handler; a locked database fails the step immediately.
        conn.busy_timeout(Duration::ZERO)?;

        let user = self.user_query.map(|q| PreparedQuery::new("user", q));
        let acl = self.acl_query.map(|q| PreparedQuery::new("acl", q));
        let mut inner = Inner { conn, user, acl };

        for query in [inner.user.as_mut(), inner.acl.as_mut()].into_iter().flatten() {
            // Failure is already logged; the handle stays unprepared.
            let _ = query.prepare(&inner.conn);
        }

        info!(
            "sqlite backend opened {} (acl {})",
            self.db_path.display(),
            if inner.acl.is_some() { "enabled" } else { "disabled" }
        );

        Ok(SqliteBackend {
            inner: Mutex::new(inner),
            db_path: self.db_path,
            matcher: self.matcher,
            expander: self.expander,
        })
    }
}

fn non_empty(query: String) -> Option<String> {
    if query.is_empty() { None } else { Some(query) }
}

impl SqliteBackend {
    /// Create a builder for the database at `db_path`.
    pub fn builder(db_path: impl Into<PathBuf>) -> SqliteBackendBuilder {
        SqliteBackendBuilder::new(db_path)
    }

    /// Open a backend from validated configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let mut builder = Self::builder(&config.db_path).user_query(&config.user_query);
        if let Some(acl) = &config.acl_query {
            builder = builder.acl_query(acl);
        }
        builder.open()
    }

    /// Path of the database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Statement counters of the user query, if configured.
    pub fn user_stats(&self) -> Option<QueryStats> {
        self.inner.lock().user.as_ref().map(PreparedQuery::stats)
    }

    /// Statement counters of the ACL query, if configured.
    pub fn acl_stats(&self) -> Option<QueryStats> {
        self.inner.lock().acl.as_ref().map(PreparedQuery::stats)
    }

    /// Look up the password hash stored for `username`.
    ///
    /// The verdict is `Defer` unless the lookup failed; a returned hash means
    /// this backend knows the user and the broker should verify against it.
    pub fn get_user(&self, username: &str) -> (Verdict, Option<String>) {
        let mut guard = self.inner.lock();
        let Inner { conn, user, .. } = &mut *guard;
        let Some(user) = user.as_mut() else {
            return (Verdict::Defer, None);
        };

        let mut value = None;
        for attempt in 1..=USER_LOOKUP_ATTEMPTS {
            let mut stmt = match user.checkout(conn) {
                Ok(stmt) => stmt,
                Err(e) => {
                    error!(query = user.name(), username, "statement unavailable: {}", e);
                    return (Verdict::Error, None);
                }
            };
            if let Err(e) = stmt.raw_bind_parameter(1, username) {
                error!(username, "can't bind: {}", e);
                return (Verdict::Error, None);
            }

            let step = {
                let mut rows = stmt.raw_query();
                rows.next().map(|row| row.map(column_text))
            };

            match step {
                Ok(Some(hash)) => value = hash,
                Ok(None) => debug!(username, attempt, "user lookup: no row"),
                Err(e) if is_transient(&e) => warn!(username, attempt, "step: {}", e),
                Err(e) => {
                    error!(username, "step: {}", e);
                    user.invalidate(stmt);
                    return (Verdict::Error, None);
                }
            }

            if value.is_some() {
                break;
            }
        }

        (Verdict::Defer, value)
    }

    /// Superuser checks always defer.
    pub fn superuser(&self, _username: &str) -> Verdict {
        Verdict::Defer
    }

    /// Check whether `username` may access `topic` with the given mode.
    ///
    /// Without an ACL query every request is allowed. Otherwise each returned
    /// pattern is expanded and matched against `topic`; the first match
    /// allows, and no match defers.
    pub fn acl_check(&self, client_id: &str, username: &str, topic: &str, access: i32) -> Verdict {
        let mut guard = self.inner.lock();
        let Inner { conn, acl, .. } = &mut *guard;
        let Some(acl) = acl.as_mut() else {
            return Verdict::Allow;
        };

        let mut stmt = match acl.checkout(conn) {
            Ok(stmt) => stmt,
            Err(e) => {
                error!(query = acl.name(), username, "statement unavailable: {}", e);
                return Verdict::Error;
            }
        };
        if let Err(e) = stmt
            .raw_bind_parameter(1, username)
            .and_then(|()| stmt.raw_bind_parameter(2, access))
        {
            error!(username, "can't bind: {}", e);
            return Verdict::Error;
        }

        let mut verdict = Verdict::Defer;
        let stepped = {
            let mut rows = stmt.raw_query();
            loop {
                let row = match rows.next() {
                    Ok(Some(row)) => row,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                };
                let Some(pattern) = column_text(row) else {
                    continue;
                };
                let expanded = self.expander.expand(client_id, username, &pattern);
                if expanded.is_empty() {
                    continue;
                }
                let matched = self.matcher.matches(&expanded, topic);
                debug!("sqlite: topic_matches({}, {}) == {}", expanded, topic, matched);
                if matched {
                    verdict = Verdict::Allow;
                    break Ok(());
                }
            }
        };

        match stepped {
            Ok(()) => verdict,
            Err(e) if is_transient(&e) => {
                warn!(username, topic, "acl step: {}", e);
                verdict
            }
            Err(e) => {
                error!(username, topic, "acl step: {}", e);
                acl.invalidate(stmt);
                Verdict::Error
            }
        }
    }

    /// Finalize the statements and close the database.
    pub fn close(self) {
        let inner = self.inner.into_inner();
        inner.conn.flush_prepared_statement_cache();
        match inner.conn.close() {
            Ok(()) => debug!("sqlite backend closed {}", self.db_path.display()),
            Err((_, e)) => error!("failed to close {}: {}", self.db_path.display(), e),
        }
    }
}
