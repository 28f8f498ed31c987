//! Implements a struct that holds the state of the REST server.

use crate::pool::ConnectionPool;

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The pool that request handlers borrow database connections from.
    pub pool: ConnectionPool,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl AppState {
    /// Create a new [AppState] around an already initialized connection pool.
    ///
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    pub fn new(pool: ConnectionPool, local_timezone: &str) -> Self {
        Self {
            pool,
            local_timezone: local_timezone.to_owned(),
        }
    }
}
