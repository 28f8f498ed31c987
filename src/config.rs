//! Command line and environment configuration for the server.

use std::time::Duration;

use clap::Parser;

use crate::pool::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_IDLE,
    PoolConfig,
};

/// The JSON API server for recording expenses.
///
/// Every option can also be set with the environment variable named in its help text.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// File path to the application SQLite database.
    #[arg(long, env = "DATABASE_PATH", default_value = "expenses.db")]
    pub db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// The most database connections to keep open at once.
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// The number of database connections opened at startup.
    #[arg(long, env = "MIN_IDLE_CONNECTIONS", default_value_t = DEFAULT_MIN_IDLE)]
    pub min_idle_connections: u32,

    /// Seconds to wait for a free database connection before responding 503.
    #[arg(long, env = "ACQUIRE_TIMEOUT_SECS", default_value_t = DEFAULT_ACQUIRE_TIMEOUT.as_secs())]
    pub acquire_timeout_secs: u64,

    /// Milliseconds a statement waits on a locked database before failing.
    #[arg(long, env = "BUSY_TIMEOUT_MS", default_value_t = DEFAULT_BUSY_TIMEOUT.as_millis() as u64)]
    pub busy_timeout_ms: u64,

    /// The canonical name of the timezone used to decide what today's date is.
    #[arg(long, env = "LOCAL_TIMEZONE", default_value = "Etc/UTC")]
    pub local_timezone: String,

    /// Log at the debug level to stdout.
    #[arg(long, env = "DEBUG")]
    pub debug: bool,
}

impl Config {
    /// The connection pool settings for a database file at [Config::db_path].
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.max_connections,
            min_idle: self.min_idle_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            ..PoolConfig::file(&self.db_path)
        }
    }
}
