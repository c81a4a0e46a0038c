//! `SQLite` connection pool with WAL mode and foreign keys enabled.
//!
//! Every connection handed out by the pool has passed through
//! [`PragmaCustomizer`], so cascading deletes and the busy timeout hold for
//! all callers.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;
use crate::migrations::run_migrations;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Connection pool configuration.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA foreign_keys = ON;\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))
    }
}

fn builder(config: &ConnectionConfig) -> r2d2::Builder<SqliteConnectionManager> {
    Pool::builder()
        .max_size(config.pool_size.max(1))
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
}

/// Create a file-backed connection pool.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    Ok(builder(config).build(SqliteConnectionManager::file(path))?)
}

/// Create a pool over a single shared in-memory database (for tests and
/// ephemeral runs).
///
/// Plain `:memory:` gives every connection its own empty database, so this
/// uses a uniquely named shared-cache URI instead.
///
/// Shared-cache writers fail with `SQLITE_LOCKED` rather than waiting on the
/// busy timeout, so the pool holds exactly one connection and concurrent
/// callers queue in r2d2. That connection is never reaped: the database is
/// dropped as soon as its last connection closes.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    let uri = format!("file:trellis-{}?mode=memory&cache=shared", uuid::Uuid::now_v7());
    let pool = builder(config)
        .max_size(1)
        .min_idle(Some(1))
        .idle_timeout(None)
        .max_lifetime(None)
        .build(SqliteConnectionManager::file(uri))?;
    Ok(pool)
}

/// Open a pool for `path` (`:memory:` selects [`new_in_memory`]) and bring
/// the schema up to date.
pub fn open(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = if path == ":memory:" {
        new_in_memory(config)?
    } else {
        new_file(path, config)?
    };
    let conn = pool.get()?;
    let _ = run_migrations(&conn)?;
    drop(conn);
    Ok(pool)
}

/// Check that the pool hands out a working connection.
pub fn ping(pool: &ConnectionPool) -> Result<()> {
    let conn = pool.get()?;
    let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
    Ok(())
}

/// Foreign-key enforcement state of a connection.
pub fn foreign_keys_enabled(conn: &Connection) -> Result<bool> {
    let enabled: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    Ok(enabled == 1)
}
