use std::net::SocketAddr;

use axum_server::Handle;
use clap::Parser;

use expenses_rs::{
    AppState, Config, add_tracing_layer, build_router, get_local_offset, graceful_shutdown,
    initialize_db, pool::ConnectionPool, setup_logging,
};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    setup_logging(config.debug).expect("Could not create log file");

    if get_local_offset(&config.local_timezone).is_none() {
        tracing::error!("Invalid timezone {}", config.local_timezone);
        std::process::exit(1);
    }

    let pool = ConnectionPool::new(config.pool_config()).expect("Could not create connection pool");

    {
        let connection = pool
            .acquire()
            .expect("Could not get a connection to initialize the database");
        initialize_db(&connection).expect("Could not initialize database");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(AppState::new(
        pool.clone(),
        &config.local_timezone,
    )));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Server stopped unexpectedly");

    tokio::task::spawn_blocking(move || pool.shutdown())
        .await
        .expect("Could not shut down the connection pool");
}
