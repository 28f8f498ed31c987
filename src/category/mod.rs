//! Categories for grouping expenses, with a per-user limit on custom categories.

mod db;
mod domain;

pub use db::{
    CUSTOM_CATEGORY_LIMIT, DEFAULT_CATEGORIES, count_custom_categories, create_category_table,
    create_custom_category, create_default_categories, delete_custom_category, get_categories_for_user,
    get_category,
};
pub use domain::{
    Category, CategoryId, CategoryName, MAX_CATEGORY_NAME_LENGTH, NewCustomCategory, UserId,
};
