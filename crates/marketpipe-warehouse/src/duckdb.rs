//! `DuckDB` connection pool management.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ::duckdb::Connection;

/// Access mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access.
    ReadOnly,
    /// Read-write access.
    ReadWrite,
}

struct IdleConnection {
    connection: Connection,
    opened_at: Instant,
}

struct PoolState {
    read_only: Vec<IdleConnection>,
    read_write: Vec<IdleConnection>,
}

impl PoolState {
    fn new() -> Self {
        Self {
            read_only: Vec::new(),
            read_write: Vec::new(),
        }
    }
}

struct PoolInner {
    db_path: PathBuf,
    max_pool_size: usize,
    recycle_after: Duration,
    state: Mutex<PoolState>,
}

/// A connection pool manager for `DuckDB` connections.
///
/// Idle connections are recycled after a bounded lifetime and probed with a
/// liveness check before reuse; anything stale or broken is reopened.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Create a new connection pool manager.
    ///
    /// # Arguments
    /// * `path` - Path to the `DuckDB` database file
    /// * `max_pool_size` - Maximum number of idle connections to keep
    /// * `recycle_after` - Idle lifetime after which a connection is reopened
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        max_pool_size: usize,
        recycle_after: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                db_path: path.into(),
                max_pool_size: max_pool_size.max(1),
                recycle_after,
                state: Mutex::new(PoolState::new()),
            }),
        }
    }

    /// Acquire a connection from the pool.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    ///
    /// # Panics
    /// Panics if the connection pool mutex is poisoned (indicating a previous
    /// panic while holding the lock).
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        loop {
            let mut state = self
                .inner
                .state
                .lock()
                .expect("duckdb connection pool mutex poisoned");
            let idle = match mode {
                AccessMode::ReadOnly => state.read_only.pop(),
                AccessMode::ReadWrite => state.read_write.pop(),
            };
            drop(state);

            let Some(idle) = idle else {
                let connection = open_connection(self.inner.db_path.as_path(), mode)?;
                return Ok(self.wrap(mode, connection, Instant::now()));
            };

            if idle.opened_at.elapsed() > self.inner.recycle_after {
                // Past its idle lifetime; drop and try the next candidate.
                continue;
            }
            let alive = idle
                .connection
                .query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
                .is_ok();
            if !alive {
                continue;
            }

            return Ok(self.wrap(mode, idle.connection, idle.opened_at));
        }
    }

    fn wrap(&self, mode: AccessMode, connection: Connection, opened_at: Instant) -> PooledConnection {
        PooledConnection {
            mode,
            opened_at,
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    mode: AccessMode,
    opened_at: Instant,
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        if self.opened_at.elapsed() > self.pool.recycle_after {
            return;
        }

        let mut state = self
            .pool
            .state
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        let idle = IdleConnection {
            connection,
            opened_at: self.opened_at,
        };
        match self.mode {
            AccessMode::ReadOnly => {
                if state.read_only.len() < self.pool.max_pool_size {
                    state.read_only.push(idle);
                }
            }
            AccessMode::ReadWrite => {
                if state.read_write.len() < self.pool.max_pool_size {
                    state.read_write.push(idle);
                }
            }
        }
    }
}

/// Open a new database connection.
fn open_connection(path: &Path, mode: AccessMode) -> Result<Connection, ::duckdb::Error> {
    let connection = Connection::open(path)?;
    configure_connection(&connection, mode)?;
    Ok(connection)
}

/// Configure a database connection with appropriate settings.
fn configure_connection(connection: &Connection, mode: AccessMode) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    if mode == AccessMode::ReadOnly {
        // This statement can fail on older embedded versions; write paths
        // still go through ReadWrite connections only.
        let _ = connection.execute_batch("SET access_mode = 'READ_ONLY';");
    }
    Ok(())
}
