//! Recording money spent: storage, the service layer, and the JSON endpoints.

mod db;
mod domain;
mod endpoints;
mod service;

pub use db::{
    create_expense, create_expense_table, delete_expense, get_all_expenses, get_expense,
    update_expense,
};
pub use domain::{
    Amount, Expense, ExpenseForm, ExpenseId, ExpenseUpdate, ExpenseUpdateForm,
    MAX_DESCRIPTION_LENGTH, NewExpense,
};
pub use endpoints::{
    ExpenseEndpointState, create_expense_endpoint, delete_expense_endpoint, get_expense_endpoint,
    get_expenses_endpoint, update_expense_endpoint,
};
pub use service::{ExpenseService, ServiceError};
