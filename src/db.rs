//! Store-level errors and database initialization.

use rusqlite::Connection;

use crate::{
    category::{
        CategoryId, DEFAULT_CATEGORIES, create_category_table, create_default_categories,
    },
    expense::create_expense_table,
};

/// Errors originating from operations on the app's database.
///
/// Store functions roll back their transaction before returning any of these.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StoreError {
    /// A statement failed for a technical reason, e.g. a locked or corrupt
    /// database. The operation should not be retried automatically.
    #[error("an unexpected SQL error occurred: {0}")]
    Storage(rusqlite::Error),

    /// The owner already has a category with this name.
    #[error("a category named \"{0}\" already exists")]
    DuplicateName(String),

    /// The owner has reached their custom category limit.
    #[error("the limit of {limit} custom categories has been reached")]
    QuotaExceeded {
        /// The most custom categories a single owner may have.
        limit: u32,
    },

    /// The parent ID does not refer to an existing category.
    #[error("the parent category {0} does not exist")]
    InvalidParent(CategoryId),
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        tracing::error!("an unhandled SQL error occurred: {}", error);
        StoreError::Storage(error)
    }
}

/// Whether `error` is SQLite rejecting a row for breaking a `UNIQUE` constraint.
pub(crate) fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        )
    )
}

/// Create the tables for the domain models and seed the default categories.
///
/// Safe to run against a database that has already been initialized.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), StoreError> {
    let transaction = connection.unchecked_transaction()?;

    create_category_table(&transaction)?;
    create_expense_table(&transaction)?;

    transaction.commit()?;

    let created_count = create_default_categories(DEFAULT_CATEGORIES, connection)?;
    tracing::info!("Database initialized, created {created_count} default categories");

    Ok(())
}
