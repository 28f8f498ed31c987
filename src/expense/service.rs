//! Expense operations for callers that should not see storage details.

use rusqlite::Connection;

use crate::{
    db::StoreError,
    expense::{
        Expense, ExpenseId, ExpenseUpdate, NewExpense, create_expense, delete_expense,
        get_all_expenses, get_expense, update_expense,
    },
};

/// The errors an [ExpenseService] operation can fail with.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ServiceError {
    /// There is no expense with the given ID.
    #[error("expense {0} not found")]
    ExpenseNotFound(ExpenseId),

    /// The store failed. Holds the store's error message.
    #[error("database error: {0}")]
    Database(String),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        tracing::error!("Expense store failed: {error}");
        ServiceError::Database(error.to_string())
    }
}

/// Expense operations over a single borrowed database connection.
pub struct ExpenseService<'c> {
    connection: &'c Connection,
}

impl<'c> ExpenseService<'c> {
    /// Create a service that runs its queries on `connection`.
    pub fn new(connection: &'c Connection) -> Self {
        Self { connection }
    }

    /// Store a new expense.
    pub fn create(&self, new_expense: NewExpense) -> Result<Expense, ServiceError> {
        Ok(create_expense(new_expense, self.connection)?)
    }

    /// Get the expense with `id`, or `None` if it does not exist.
    pub fn get_by_id(&self, id: ExpenseId) -> Result<Option<Expense>, ServiceError> {
        Ok(get_expense(id, self.connection)?)
    }

    /// Get every expense, most recent first.
    pub fn get_all(&self) -> Result<Vec<Expense>, ServiceError> {
        Ok(get_all_expenses(self.connection)?)
    }

    /// Apply `update` to the expense with `id`.
    ///
    /// # Errors
    /// Returns [ServiceError::ExpenseNotFound] if there is no expense with `id`.
    pub fn update(&self, id: ExpenseId, update: ExpenseUpdate) -> Result<Expense, ServiceError> {
        update_expense(id, update, self.connection)?.ok_or(ServiceError::ExpenseNotFound(id))
    }

    /// Delete the expense with `id`.
    ///
    /// # Errors
    /// Returns [ServiceError::ExpenseNotFound] if there is no expense with `id`.
    pub fn delete(&self, id: ExpenseId) -> Result<(), ServiceError> {
        if delete_expense(id, self.connection)? {
            Ok(())
        } else {
            Err(ServiceError::ExpenseNotFound(id))
        }
    }
}
