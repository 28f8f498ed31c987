//! JSON endpoints for creating, reading, updating and deleting expenses.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use time::Date;

use crate::{
    AppState,
    error::{ApiError, JsonBody},
    expense::{
        Expense, ExpenseForm, ExpenseId, ExpenseService, ExpenseUpdateForm, ServiceError,
    },
    pool::ConnectionPool,
    timezone::local_today,
};

/// The state needed by the expense endpoints.
#[derive(Debug, Clone)]
pub struct ExpenseEndpointState {
    /// The pool each request borrows one connection from.
    pub pool: ConnectionPool,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for ExpenseEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            pool: state.pool.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

impl ExpenseEndpointState {
    fn today(&self) -> Result<Date, ApiError> {
        local_today(&self.local_timezone).ok_or_else(|| {
            tracing::error!("Invalid timezone {}", self.local_timezone);
            ApiError::Internal
        })
    }
}

/// Sets its flag when dropped, i.e. when the request future is abandoned.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Turns every commit on `connection` into a rollback once `cancelled` is set.
///
/// The hook is removed when the guard is dropped, before the connection goes
/// back to the pool.
struct CommitHookGuard<'c> {
    connection: &'c Connection,
}

impl<'c> CommitHookGuard<'c> {
    fn install(connection: &'c Connection, cancelled: Arc<AtomicBool>) -> Result<Self, ApiError> {
        connection
            .commit_hook(Some(move || cancelled.load(Ordering::Acquire)))
            .map_err(|error| {
                tracing::error!("Could not install commit hook: {error}");
                ApiError::Internal
            })?;

        Ok(Self { connection })
    }
}

impl Drop for CommitHookGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.connection.commit_hook(None::<fn() -> bool>) {
            tracing::error!("Could not remove commit hook: {error}");
        }
    }
}

/// Run `operation` on a blocking thread with a service over one pooled connection.
///
/// The connection goes back to the pool when `operation` returns, whether it
/// succeeded or not. If the returned future is dropped before `operation`
/// finishes, e.g. because the client disconnected, any write it has not yet
/// committed is rolled back.
async fn with_service<T, F>(pool: ConnectionPool, operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ExpenseService<'_>) -> Result<T, ServiceError> + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancelled));

    tokio::task::spawn_blocking(move || -> Result<T, ApiError> {
        if cancelled.load(Ordering::Acquire) {
            tracing::debug!("Request was abandoned before it reached the database");
            return Err(ApiError::Internal);
        }

        let connection = pool.acquire()?;
        let _commit_hook = CommitHookGuard::install(&connection, Arc::clone(&cancelled))?;
        let service = ExpenseService::new(&connection);

        let result = operation(&service);

        if cancelled.load(Ordering::Acquire) {
            tracing::warn!("Request was abandoned, its changes were rolled back");
        }

        Ok(result?)
    })
    .await
    .map_err(|error| {
        tracing::error!("Expense task did not run to completion: {error}");
        ApiError::Internal
    })?
}

/// Create an expense from the JSON request body.
///
/// Responds with `201 Created` and the stored expense.
pub async fn create_expense_endpoint(
    State(state): State<ExpenseEndpointState>,
    JsonBody(form): JsonBody<ExpenseForm>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    let new_expense = form.validate(state.today()?)?;

    let expense = with_service(state.pool, move |service| service.create(new_expense)).await?;

    Ok((StatusCode::CREATED, Json(expense)))
}

/// List every expense, most recent first.
pub async fn get_expenses_endpoint(
    State(state): State<ExpenseEndpointState>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    with_service(state.pool, |service| service.get_all())
        .await
        .map(Json)
}

/// Get a single expense.
pub async fn get_expense_endpoint(
    Path(expense_id): Path<ExpenseId>,
    State(state): State<ExpenseEndpointState>,
) -> Result<Json<Expense>, ApiError> {
    with_service(state.pool, move |service| service.get_by_id(expense_id))
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::ExpenseNotFound(expense_id).into())
}

/// Apply a partial update from the JSON request body to an expense.
pub async fn update_expense_endpoint(
    Path(expense_id): Path<ExpenseId>,
    State(state): State<ExpenseEndpointState>,
    JsonBody(form): JsonBody<ExpenseUpdateForm>,
) -> Result<Json<Expense>, ApiError> {
    let update = form.validate(state.today()?)?;

    with_service(state.pool, move |service| service.update(expense_id, update))
        .await
        .map(Json)
}

/// Delete an expense. Responds with `204 No Content`.
pub async fn delete_expense_endpoint(
    Path(expense_id): Path<ExpenseId>,
    State(state): State<ExpenseEndpointState>,
) -> Result<StatusCode, ApiError> {
    with_service(state.pool, move |service| service.delete(expense_id)).await?;

    Ok(StatusCode::NO_CONTENT)
}
