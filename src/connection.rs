//! Connection opening and process-wide engine preparation.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

use rusqlite::Connection;
use tracing::debug;

use crate::error::{DbError, Result};

static ENGINE_INIT: Once = Once::new();
static LIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

/// Prepare the bundled SQLite engine for use.
///
/// The engine runs its global setup lazily on first use; forcing it here,
/// under a [`Once`], keeps concurrent first opens from racing it. Safe to
/// call any number of times; only the first call does work.
pub fn ensure_engine_ready() {
    ENGINE_INIT.call_once(|| {
        debug!("preparing sqlite engine");
        let _ = Connection::open_in_memory();
    });
}

/// Open a new connection to the database named by `connection_string`
/// (a filesystem path, or `:memory:`).
pub fn open(connection_string: &str) -> Result<DbConnection> {
    ensure_engine_ready();
    let conn = Connection::open(connection_string).map_err(DbError::Connection)?;
    LIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst);
    debug!(database = connection_string, "opened sqlite connection");
    Ok(DbConnection { conn })
}

/// Number of connections this crate currently holds open.
///
/// Diagnostic gauge; leak tests assert it returns to baseline after every
/// operation, including ones that fail mid-statement.
pub fn live_connection_count() -> usize {
    LIVE_CONNECTIONS.load(Ordering::SeqCst)
}

/// An opened connection handle.
///
/// Owned exclusively by whoever opened it; dropping it closes the
/// underlying connection on every exit path.
pub struct DbConnection {
    conn: Connection,
}

impl Deref for DbConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for DbConnection {
    fn drop(&mut self) {
        LIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The gauge is process-global; serialize the tests that read it.
    static GAUGE_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn engine_preparation_is_idempotent() {
        let _guard = GAUGE_LOCK.lock().unwrap();
        ensure_engine_ready();
        ensure_engine_ready();
        assert!(open(":memory:").is_ok());
    }

    #[test]
    fn dropping_a_handle_releases_it() {
        let _guard = GAUGE_LOCK.lock().unwrap();
        let baseline = live_connection_count();
        let conn = open(":memory:").unwrap();
        assert_eq!(live_connection_count(), baseline + 1);
        drop(conn);
        assert_eq!(live_connection_count(), baseline);
    }

    #[test]
    fn open_failures_do_not_count() {
        let _guard = GAUGE_LOCK.lock().unwrap();
        let baseline = live_connection_count();
        let result = open("/nonexistent-dir/definitely/missing.db");
        assert!(matches!(result, Err(DbError::Connection(_))));
        assert_eq!(live_connection_count(), baseline);
    }
}
