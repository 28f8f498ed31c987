//! A service for recording expenses, backed by a pool of SQLite connections.
//!
//! Expenses are stored with fixed-point amounts and can be grouped into
//! categories. Every user starts with a set of default categories and may add
//! a limited number of their own.
//!
//! This library provides the storage and service layers along with a small
//! JSON API over the expense operations.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod config;
mod db;
mod error;
mod logging;
mod routing;
mod timezone;

pub mod category;
pub mod endpoints;
pub mod expense;
pub mod pool;

pub use app_state::AppState;
pub use config::Config;
pub use db::{StoreError, initialize as initialize_db};
pub use error::{ApiError, JsonBody, ValidationError};
pub use logging::{
    DEBUG_LOG_PATH, LOG_BODY_LENGTH_LIMIT, REQUEST_BODY_SIZE_LIMIT, add_tracing_layer,
    logging_middleware, setup_logging,
};
pub use routing::build_router;
pub use timezone::{get_local_offset, local_today};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
