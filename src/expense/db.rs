//! Database operations for expenses.

use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension, Row, ToSql, params_from_iter, types::Type};
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::{
    category::CategoryName,
    db::StoreError,
    expense::{Amount, Expense, ExpenseId, ExpenseUpdate, NewExpense},
};

const EXPENSE_COLUMNS: &str = "id, amount, category, description, date, created_at, updated_at";

/// Store a new expense and return it with its ID and timestamps filled in.
///
/// # Errors
/// Returns [StoreError::Storage] if there is an SQL error, in which case
/// nothing is stored.
pub fn create_expense(new_expense: NewExpense, connection: &Connection) -> Result<Expense, StoreError> {
    let transaction = connection.unchecked_transaction()?;
    let now = OffsetDateTime::now_utc();

    let expense = transaction
        .prepare(&format!(
            "INSERT INTO expense (amount, category, description, date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             RETURNING {EXPENSE_COLUMNS}"
        ))?
        .query_row(
            (
                new_expense.amount.to_string(),
                new_expense.category.as_ref(),
                new_expense.description,
                new_expense.date,
                now,
            ),
            map_expense_row,
        )?;

    transaction.commit()?;

    tracing::debug!("Created expense {}", expense.id);

    Ok(expense)
}

/// Retrieve a single expense by ID, or `None` if there is no such expense.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_expense(id: ExpenseId, connection: &Connection) -> Result<Option<Expense>, StoreError> {
    connection
        .prepare(&format!("SELECT {EXPENSE_COLUMNS} FROM expense WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_expense_row)
        .optional()
        .map_err(|error| error.into())
}

/// Retrieve every expense, most recent date first.
///
/// Expenses on the same date are ordered by when they were recorded, newest first.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_all_expenses(connection: &Connection) -> Result<Vec<Expense>, StoreError> {
    connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense ORDER BY date DESC, created_at DESC, id DESC"
        ))?
        .query_map([], map_expense_row)?
        .map(|maybe_expense| maybe_expense.map_err(|error| error.into()))
        .collect()
}

/// Change the fields set in `update` on the expense with `id`.
///
/// Returns the updated expense, or `None` if there is no expense with `id`.
/// An update with no fields set does not write anything and returns the
/// expense as it is stored. Otherwise `updated_at` is set to the current time.
///
/// # Errors
/// Returns [StoreError::Storage] if there is an SQL error, in which case
/// nothing is changed.
pub fn update_expense(
    id: ExpenseId,
    update: ExpenseUpdate,
    connection: &Connection,
) -> Result<Option<Expense>, StoreError> {
    if update.is_empty() {
        return get_expense(id, connection);
    }

    let mut assignments = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(amount) = update.amount {
        values.push(Box::new(amount.to_string()));
        assignments.push(format!("amount = ?{}", values.len()));
    }

    if let Some(category) = update.category {
        values.push(Box::new(category.to_string()));
        assignments.push(format!("category = ?{}", values.len()));
    }

    if let Some(description) = update.description {
        values.push(Box::new(description));
        assignments.push(format!("description = ?{}", values.len()));
    }

    if let Some(date) = update.date {
        values.push(Box::new(date));
        assignments.push(format!("date = ?{}", values.len()));
    }

    values.push(Box::new(OffsetDateTime::now_utc()));
    assignments.push(format!("updated_at = ?{}", values.len()));

    values.push(Box::new(id));
    let query = format!(
        "UPDATE expense SET {} WHERE id = ?{} RETURNING {EXPENSE_COLUMNS}",
        assignments.join(", "),
        values.len()
    );

    let transaction = connection.unchecked_transaction()?;

    let maybe_expense = transaction
        .prepare(&query)?
        .query_row(params_from_iter(values.iter()), map_expense_row)
        .optional()?;

    match maybe_expense {
        Some(expense) => {
            transaction.commit()?;
            tracing::debug!("Updated expense {id}");
            Ok(Some(expense))
        }
        None => {
            transaction.rollback()?;
            Ok(None)
        }
    }
}

/// Delete the expense with `id`.
///
/// Returns `false` if there is no expense with `id`.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn delete_expense(id: ExpenseId, connection: &Connection) -> Result<bool, StoreError> {
    let transaction = connection.unchecked_transaction()?;

    let rows_affected = transaction.execute("DELETE FROM expense WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        transaction.rollback()?;
        return Ok(false);
    }

    transaction.commit()?;
    tracing::debug!("Deleted expense {id}");

    Ok(true)
}

/// Initialize the expense table and indexes.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
            )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_expense_date_created_at ON expense(date, created_at);",
        (),
    )?;

    Ok(())
}

fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_amount: String = row.get(1)?;
    let amount = Decimal::from_str(&raw_amount)
        .map(Amount::new_unchecked)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(error)))?;
    let raw_category: String = row.get(2)?;
    let description = row.get(3)?;
    let date = row.get(4)?;
    let created_at = row.get(5)?;
    let updated_at = row.get(6)?;

    Ok(Expense {
        id,
        amount,
        category: CategoryName::new_unchecked(&raw_category),
        description,
        date,
        created_at,
        updated_at,
    })
}
