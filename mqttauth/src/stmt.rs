//! Prepared query handles.
//!
//! The parsed statement itself lives in the connection's statement cache,
//! keyed by the query text. A [`PreparedQuery`] tracks whether that token is
//! live: it is prepared once, checked out for each use cycle, returned to the
//! cache (reset, bindings cleared) when the cycle ends, and discarded after a
//! fatal step error so the next use parses it again.

use rusqlite::types::ValueRef;
use rusqlite::{CachedStatement, Connection, ErrorCode, Row};
use tracing::{debug, warn};

/// Prepare and invalidation counters of one query handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Successful prepares, including the first one.
    pub prepares: u64,
    /// Statements discarded after a fatal step error.
    pub invalidations: u64,
}

/// One reusable query against the backend connection.
#[derive(Debug)]
pub(crate) struct PreparedQuery {
    name: &'static str,
    query: String,
    prepared: bool,
    stats: QueryStats,
}

impl PreparedQuery {
    /// Create an unprepared handle. `query` must not be empty.
    pub(crate) fn new(name: &'static str, query: impl Into<String>) -> Self {
        let query = query.into();
        debug_assert!(!query.is_empty());
        Self {
            name,
            query,
            prepared: false,
            stats: QueryStats::default(),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub(crate) fn stats(&self) -> QueryStats {
        self.stats
    }

    /// Parse the query into the statement cache.
    pub(crate) fn prepare(&mut self, conn: &Connection) -> rusqlite::Result<()> {
        match conn.prepare_cached(&self.query) {
            Ok(stmt) => {
                drop(stmt);
                self.prepared = true;
                self.stats.prepares += 1;
                debug!(query = self.name, bytes = self.query.len(), "statement prepared");
                Ok(())
            }
            Err(e) => {
                warn!(query = self.name, "can't prepare: {}", e);
                Err(e)
            }
        }
    }

    /// Check out the statement for one bind/step cycle.
    ///
    /// Prepares first if no live statement exists. The returned statement is
    /// reset and has no bindings; dropping it resets it and hands it back.
    pub(crate) fn checkout<'c>(
        &mut self,
        conn: &'c Connection,
    ) -> rusqlite::Result<CachedStatement<'c>> {
        if !self.prepared {
            self.prepare(conn)?;
        }
        let mut stmt = conn.prepare_cached(&self.query)?;
        stmt.clear_bindings();
        Ok(stmt)
    }

    /// Finalize a statement that failed to step; the next checkout re-prepares.
    pub(crate) fn invalidate(&mut self, stmt: CachedStatement<'_>) {
        stmt.discard();
        self.prepared = false;
        self.stats.invalidations += 1;
        debug!(query = self.name, "statement invalidated");
    }
}

/// Busy and locked databases may succeed on a later step.
pub(crate) fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Column 0 as text.
///
/// Text and blobs are taken as UTF-8, integers in decimal. Reals use Rust's
/// shortest round-trip formatting, so `1.0` renders as `1`, unlike SQLite's
/// own `CAST(x AS TEXT)`. `None` for NULL and for rows without a first column.
pub(crate) fn column_text(row: &Row<'_>) -> Option<String> {
    match row.get_ref(0) {
        Ok(ValueRef::Null) => None,
        Ok(ValueRef::Integer(i)) => Some(i.to_string()),
        Ok(ValueRef::Real(f)) => Some(f.to_string()),
        Ok(ValueRef::Text(b)) | Ok(ValueRef::Blob(b)) => {
            Some(String::from_utf8_lossy(b).into_owned())
        }
        Err(e) => {
            debug!("column 0 unavailable: {}", e);
            None
        }
    }
}
