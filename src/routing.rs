//! Application router configuration.

use axum::{Json, Router, middleware, routing::get};
use serde_json::{Value, json};

use crate::{
    AppState, endpoints,
    expense::{
        create_expense_endpoint, delete_expense_endpoint, get_expense_endpoint,
        get_expenses_endpoint, update_expense_endpoint,
    },
    logging::logging_middleware,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(get_root))
        .route(endpoints::HEALTH, get(get_health))
        .route(
            endpoints::EXPENSES,
            get(get_expenses_endpoint).post(create_expense_endpoint),
        )
        .route(
            endpoints::EXPENSE,
            get(get_expense_endpoint)
                .put(update_expense_endpoint)
                .delete(delete_expense_endpoint),
        )
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// Report that the server is up.
async fn get_root() -> Json<Value> {
    Json(json!({ "message": "Expense tracker API is running" }))
}

/// Health check for load balancers and container orchestrators.
async fn get_health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
