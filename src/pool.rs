//! A bounded pool of SQLite connections.
//!
//! Connections are opened lazily up to [PoolConfig::max_connections], with
//! [PoolConfig::min_idle] of them opened up front. A connection borrowed with
//! [ConnectionPool::acquire] goes back to the idle set when its guard is
//! dropped, so every exit path of a borrower releases it, including early
//! returns and panics.

use std::{
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use rusqlite::Connection;

/// The default maximum number of open connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
/// The default number of connections kept open while idle.
pub const DEFAULT_MIN_IDLE: u32 = 2;
/// How long [ConnectionPool::acquire] waits for a connection by default.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a statement waits on another connection's write lock by default.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(10);

static IN_MEMORY_DATABASE_COUNT: AtomicU64 = AtomicU64::new(0);

/// Errors that occur while creating or borrowing from a [ConnectionPool].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PoolError {
    /// No connection became available within the acquire timeout.
    ///
    /// Callers may retry after backing off.
    #[error("no database connection became available within {0:?}")]
    Exhausted(Duration),

    /// The pool settings are not usable, e.g. a maximum size of zero.
    #[error("invalid connection pool settings: {0}")]
    InvalidConfig(String),

    /// The initial idle connections could not be opened.
    #[error("could not open the initial database connections: {0}")]
    Initialization(String),

    /// The pool has been shut down and no longer lends connections.
    #[error("the connection pool has been shut down")]
    Closed,
}

/// Where the pooled connections point to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    /// A SQLite database file, created if it does not exist.
    File(String),
    /// A named in-memory database shared by every connection in the pool.
    ///
    /// The database lives for as long as at least one connection is open.
    Memory(String),
}

/// Settings for a [ConnectionPool].
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// The database the connections are opened against.
    pub source: DatabaseSource,
    /// The most connections that may be open at once.
    pub max_connections: u32,
    /// The number of connections opened at startup and kept open while idle.
    pub min_idle: u32,
    /// How long [ConnectionPool::acquire] blocks before giving up.
    pub acquire_timeout: Duration,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl PoolConfig {
    /// Settings for a database file at `path` with the default limits.
    pub fn file(path: &str) -> Self {
        Self {
            source: DatabaseSource::File(path.to_owned()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_idle: DEFAULT_MIN_IDLE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Settings for a fresh, uniquely named in-memory database.
    pub fn in_memory() -> Self {
        let database_number = IN_MEMORY_DATABASE_COUNT.fetch_add(1, Ordering::Relaxed);
        let name = format!("expenses-{}-{database_number}", std::process::id());

        Self {
            source: DatabaseSource::Memory(name),
            ..Self::file("")
        }
    }

    fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::InvalidConfig(
                "the maximum number of connections must be at least 1".to_owned(),
            ));
        }

        if self.min_idle > self.max_connections {
            return Err(PoolError::InvalidConfig(format!(
                "the minimum number of idle connections ({}) cannot exceed the maximum number of connections ({})",
                self.min_idle, self.max_connections
            )));
        }

        Ok(())
    }
}

/// Opens SQLite connections for [r2d2] and applies the connection pragmas.
#[derive(Debug, Clone)]
pub struct SqliteConnectionManager {
    source: DatabaseSource,
    busy_timeout: Duration,
}

impl SqliteConnectionManager {
    fn new(config: &PoolConfig) -> Self {
        Self {
            source: config.source.clone(),
            busy_timeout: config.busy_timeout,
        }
    }
}

impl r2d2::ManageConnection for SqliteConnectionManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        let connection = match &self.source {
            DatabaseSource::File(path) => Connection::open(path)?,
            DatabaseSource::Memory(name) => {
                Connection::open(format!("file:{name}?mode=memory&cache=shared"))?
            }
        };

        connection.busy_timeout(self.busy_timeout)?;
        connection.pragma_update(None, "foreign_keys", true)?;

        if let DatabaseSource::File(_) = self.source {
            connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
        }

        tracing::debug!("Opened a new database connection to {:?}", self.source);

        Ok(connection)
    }

    fn is_valid(&self, connection: &mut Connection) -> Result<(), rusqlite::Error> {
        connection.execute_batch("SELECT 1;")
    }

    fn has_broken(&self, _connection: &mut Connection) -> bool {
        false
    }
}

/// A connection borrowed from a [ConnectionPool].
///
/// Dereferences to a [rusqlite::Connection] and returns to the pool when dropped.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// A snapshot of the pool's connection counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// Open connections, both idle and borrowed.
    pub connections: u32,
    /// Open connections waiting to be borrowed.
    pub idle_connections: u32,
}

/// A process-wide handle to the database connections.
///
/// Cloning the handle is cheap and every clone refers to the same
/// connections. Create one at startup, pass it to whatever needs a
/// connection, and call [ConnectionPool::shutdown] once at teardown.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    shared: Arc<SharedPool>,
}

#[derive(Debug)]
struct SharedPool {
    /// `None` once the pool has been shut down.
    pool: RwLock<Option<r2d2::Pool<SqliteConnectionManager>>>,
    closed: AtomicBool,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    /// Create a pool and open `config.min_idle` connections.
    ///
    /// # Errors
    /// Returns a:
    /// - [PoolError::InvalidConfig] if the connection limits are inconsistent,
    /// - or [PoolError::Initialization] if the initial connections cannot be opened.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let pool = r2d2::Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(config.min_idle))
            .connection_timeout(config.acquire_timeout)
            .build(SqliteConnectionManager::new(&config))
            .map_err(|error| PoolError::Initialization(error.to_string()))?;

        tracing::info!(
            "Opened connection pool for {:?} with {} of at most {} connections",
            config.source,
            pool.state().connections,
            config.max_connections
        );

        Ok(Self {
            shared: Arc::new(SharedPool {
                pool: RwLock::new(Some(pool)),
                closed: AtomicBool::new(false),
                acquire_timeout: config.acquire_timeout,
            }),
        })
    }

    /// Borrow a connection, waiting up to the acquire timeout for one to free up.
    ///
    /// # Errors
    /// Returns a:
    /// - [PoolError::Closed] if [ConnectionPool::shutdown] has been called,
    /// - or [PoolError::Exhausted] if no connection became available in time.
    pub fn acquire(&self) -> Result<PooledConnection, PoolError> {
        let pool = self.open_pool().ok_or(PoolError::Closed)?;

        pool.get().map_err(|error| {
            tracing::warn!("Could not acquire a database connection: {error}");
            PoolError::Exhausted(self.shared.acquire_timeout)
        })
    }

    /// The current connection counts. Both are zero after shutdown.
    pub fn state(&self) -> PoolState {
        let Some(pool) = self.inner_pool() else {
            return PoolState {
                connections: 0,
                idle_connections: 0,
            };
        };
        let state = pool.state();

        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// Stop lending connections and close them all.
    ///
    /// New calls to [ConnectionPool::acquire], on this handle or any clone,
    /// fail with [PoolError::Closed]. Borrowed connections are given up to the
    /// acquire timeout to come back, then every connection is closed. A
    /// connection still borrowed after that is closed when its guard is dropped.
    ///
    /// Blocks the calling thread while waiting. Calling it again does nothing.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let Some(pool) = self.inner_pool() else {
            return;
        };

        let deadline = Instant::now() + self.shared.acquire_timeout;
        loop {
            let state = pool.state();
            if state.idle_connections == state.connections {
                tracing::info!(
                    "Shutting down connection pool, closing {} connections",
                    state.connections
                );
                break;
            }

            if Instant::now() >= deadline {
                tracing::warn!(
                    "Shutting down connection pool with {} connections still borrowed",
                    state.connections - state.idle_connections
                );
                break;
            }

            thread::sleep(SHUTDOWN_POLL_INTERVAL);
        }

        drop(pool);
        self.shared
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn inner_pool(&self) -> Option<r2d2::Pool<SqliteConnectionManager>> {
        self.shared
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn open_pool(&self) -> Option<r2d2::Pool<SqliteConnectionManager>> {
        if self.shared.closed.load(Ordering::Acquire) {
            None
        } else {
            self.inner_pool()
        }
    }
}

#[cfg(test)]
mod pool_config_tests {
    use super::{DatabaseSource, PoolConfig, PoolError};

    #[test]
    fn in_memory_names_are_unique() {
        let first = PoolConfig::in_memory();
        let second = PoolConfig::in_memory();

        assert_ne!(first.source, second.source);
        assert!(matches!(first.source, DatabaseSource::Memory(_)));
    }

    #[test]
    fn rejects_zero_max_connections() {
        let config = PoolConfig {
            max_connections: 0,
            min_idle: 0,
            ..PoolConfig::in_memory()
        };

        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_min_idle_above_max_connections() {
        let config = PoolConfig {
            max_connections: 2,
            min_idle: 3,
            ..PoolConfig::in_memory()
        };

        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfig(_))
        ));
    }
}

#[cfg(test)]
mod connection_pool_tests {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use rusqlite::Connection;

    use super::{ConnectionPool, DatabaseSource, PoolConfig, PoolError, PoolState};

    fn small_pool(max_connections: u32, min_idle: u32) -> ConnectionPool {
        ConnectionPool::new(PoolConfig {
            max_connections,
            min_idle,
            acquire_timeout: Duration::from_millis(100),
            ..PoolConfig::in_memory()
        })
        .expect("Could not create connection pool")
    }

    #[test]
    fn prewarms_min_idle_connections() {
        let pool = small_pool(5, 2);

        let state = pool.state();

        assert_eq!(state.connections, 2);
        assert_eq!(state.idle_connections, 2);
    }

    #[test]
    fn acquire_fails_when_every_connection_is_borrowed() {
        let pool = small_pool(1, 1);
        let _held = pool.acquire().expect("Could not acquire first connection");

        let result = pool.acquire();

        assert_eq!(
            result.err(),
            Some(PoolError::Exhausted(Duration::from_millis(100)))
        );
    }

    #[test]
    fn dropping_a_connection_returns_it_to_the_pool() {
        let pool = small_pool(1, 1);

        {
            let _connection = pool.acquire().expect("Could not acquire connection");
            assert_eq!(pool.state().idle_connections, 0);
        }

        assert_eq!(pool.state().idle_connections, 1);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn connection_is_released_when_the_borrower_fails() {
        let pool = small_pool(1, 1);

        let failed = (|| -> Result<(), rusqlite::Error> {
            let connection = pool.acquire().expect("Could not acquire connection");
            connection.execute_batch("SELECT * FROM table_that_does_not_exist;")?;
            Ok(())
        })();

        assert!(failed.is_err());
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn waiting_borrower_gets_a_released_connection() {
        let pool = ConnectionPool::new(PoolConfig {
            max_connections: 1,
            min_idle: 1,
            acquire_timeout: Duration::from_secs(5),
            ..PoolConfig::in_memory()
        })
        .expect("Could not create connection pool");
        let held = pool.acquire().expect("Could not acquire connection");

        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire().map(|_| ()))
        };
        thread::sleep(Duration::from_millis(50));
        drop(held);

        assert_eq!(waiter.join().expect("Waiting thread panicked"), Ok(()));
    }

    #[test]
    fn connections_share_one_in_memory_database() {
        let pool = small_pool(2, 2);
        let first = pool.acquire().expect("Could not acquire first connection");
        let second = pool.acquire().expect("Could not acquire second connection");

        first
            .execute_batch("CREATE TABLE shared (id INTEGER PRIMARY KEY);")
            .expect("Could not create table");
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM shared", [], |row| row.get(0))
            .expect("Could not read table from second connection");

        assert_eq!(count, 0);
    }

    #[test]
    fn connections_enforce_foreign_keys() {
        let pool = small_pool(1, 1);
        let connection = pool.acquire().expect("Could not acquire connection");

        let enabled: bool = connection
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .expect("Could not read pragma");

        assert!(enabled);
    }

    #[test]
    fn rejects_invalid_settings() {
        let result = ConnectionPool::new(PoolConfig {
            max_connections: 0,
            min_idle: 0,
            ..PoolConfig::in_memory()
        });

        assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn shutdown_closes_connections_for_every_clone() {
        let pool = small_pool(3, 2);
        let clone = pool.clone();

        pool.shutdown();

        assert_eq!(
            clone.state(),
            PoolState {
                connections: 0,
                idle_connections: 0
            }
        );
        assert_eq!(clone.acquire().err(), Some(PoolError::Closed));
    }

    #[test]
    fn shutdown_closes_the_underlying_connections() {
        let config = PoolConfig {
            max_connections: 1,
            min_idle: 1,
            ..PoolConfig::in_memory()
        };
        let DatabaseSource::Memory(name) = config.source.clone() else {
            panic!("Expected an in-memory database");
        };
        let pool = ConnectionPool::new(config).expect("Could not create connection pool");
        pool.acquire()
            .expect("Could not acquire connection")
            .execute_batch("CREATE TABLE kept (id INTEGER PRIMARY KEY);")
            .expect("Could not create table");

        pool.shutdown();

        // A shared in-memory database only lives while a connection to it is open.
        let connection = Connection::open(format!("file:{name}?mode=memory&cache=shared"))
            .expect("Could not open database");
        let table_count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'kept'",
                [],
                |row| row.get(0),
            )
            .expect("Could not query schema");
        assert_eq!(table_count, 0);
    }

    #[test]
    fn shutdown_waits_for_borrowed_connections() {
        let pool = ConnectionPool::new(PoolConfig {
            max_connections: 1,
            min_idle: 1,
            acquire_timeout: Duration::from_secs(5),
            ..PoolConfig::in_memory()
        })
        .expect("Could not create connection pool");
        let connection = pool.acquire().expect("Could not acquire connection");
        let start = Instant::now();
        let borrower = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            connection.execute_batch("SELECT 1;")
        });

        pool.shutdown();

        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(borrower.join().expect("Borrowing thread panicked"), Ok(()));
        assert_eq!(pool.state().connections, 0);
    }

    #[test]
    fn shutdown_twice_does_nothing() {
        let pool = small_pool(2, 1);

        pool.shutdown();
        pool.shutdown();

        assert_eq!(pool.acquire().err(), Some(PoolError::Closed));
    }
}
