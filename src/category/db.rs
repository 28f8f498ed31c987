//! Database operations for categories.

use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::{
    category::{Category, CategoryId, CategoryName, NewCustomCategory, UserId},
    db::{StoreError, is_unique_violation},
};

/// The most custom categories a single user may own.
pub const CUSTOM_CATEGORY_LIMIT: u32 = 30;

/// The categories every user starts with.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Transport",
    "Food & Dining",
    "Housing",
    "Entertainment",
    "Health & Fitness",
    "Shopping",
    "Education",
    "Travel",
    "Insurance",
    "Investments",
    "Subscriptions",
    "Gifts & Donations",
    "Business",
    "Pets",
    "Miscellaneous",
];

const CATEGORY_COLUMNS: &str = "id, name, description, parent_id, is_custom, user_id";

/// Make sure an unowned, non-custom category exists for each of `names`.
///
/// Names that already exist are left untouched, so this can be run on every
/// startup. Returns how many categories were created.
///
/// # Errors
/// Returns an error if there is an SQL error, in which case no categories are created.
pub fn create_default_categories(names: &[&str], connection: &Connection) -> Result<usize, StoreError> {
    let transaction = connection.unchecked_transaction()?;
    let mut created_count = 0;

    {
        let mut statement = transaction.prepare(
            "INSERT INTO category (name, is_custom, user_id)
             SELECT ?1, 0, NULL
             WHERE NOT EXISTS (SELECT 1 FROM category WHERE name = ?1 AND user_id IS NULL)",
        )?;

        for name in names {
            if statement.execute([name])? > 0 {
                tracing::info!("Created default category: {name}");
                created_count += 1;
            } else {
                tracing::debug!("Default category already exists: {name}");
            }
        }
    }

    transaction.commit()?;

    Ok(created_count)
}

/// Create a custom category owned by `new_category.user_id`.
///
/// The count of the user's custom categories and the insert run in one
/// `IMMEDIATE` transaction. SQLite takes the write lock at `BEGIN`, so
/// concurrent callers queue up behind each other and each one sees the count
/// left by the previous one.
///
/// # Errors
/// This function will return a:
/// - [StoreError::QuotaExceeded] if the user already has [CUSTOM_CATEGORY_LIMIT] custom categories,
/// - [StoreError::InvalidParent] if the parent ID does not refer to an existing category,
/// - [StoreError::DuplicateName] if the user already has a category with the same name,
/// - or [StoreError::Storage] if there is some other SQL error.
pub fn create_custom_category(
    new_category: NewCustomCategory,
    connection: &Connection,
) -> Result<Category, StoreError> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let custom_count = count_custom_categories(new_category.user_id, &transaction)?;
    if custom_count >= CUSTOM_CATEGORY_LIMIT {
        tracing::debug!(
            "User {} has {custom_count} custom categories, refusing to create another",
            new_category.user_id
        );
        return Err(StoreError::QuotaExceeded {
            limit: CUSTOM_CATEGORY_LIMIT,
        });
    }

    if let Some(parent_id) = new_category.parent_id {
        if get_category(parent_id, &transaction)?.is_none() {
            return Err(StoreError::InvalidParent(parent_id));
        }
    }

    let category = transaction
        .prepare(&format!(
            "INSERT INTO category (name, description, parent_id, is_custom, user_id)
             VALUES (?1, ?2, ?3, 1, ?4)
             RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row(
            (
                new_category.name.as_ref(),
                new_category.description.as_deref(),
                new_category.parent_id,
                new_category.user_id,
            ),
            map_category_row,
        )
        .map_err(|error| {
            if is_unique_violation(&error) {
                StoreError::DuplicateName(new_category.name.to_string())
            } else {
                error.into()
            }
        })?;

    transaction.commit()?;

    Ok(category)
}

/// Count the custom categories owned by `user_id`.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn count_custom_categories(user_id: UserId, connection: &Connection) -> Result<u32, StoreError> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM category WHERE user_id = ?1 AND is_custom = 1",
            [user_id],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Retrieve a single category by ID, or `None` if there is no such category.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_category(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<Option<Category>, StoreError> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE id = :id"
        ))?
        .query_row(&[(":id", &category_id)], map_category_row)
        .optional()
        .map_err(|error| error.into())
}

/// Retrieve the default categories and the custom categories of `user_id`,
/// ordered alphabetically by name.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_categories_for_user(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Category>, StoreError> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category
             WHERE user_id IS NULL OR user_id = ?1
             ORDER BY name ASC, id ASC"
        ))?
        .query_map([user_id], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Delete a custom category owned by `user_id` along with its subcategories.
///
/// Returns `false` if no such category exists, or it is a default category,
/// or it belongs to another user.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn delete_custom_category(
    category_id: CategoryId,
    user_id: UserId,
    connection: &Connection,
) -> Result<bool, StoreError> {
    let transaction = connection.unchecked_transaction()?;

    let rows_affected = transaction.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2 AND is_custom = 1",
        (category_id, user_id),
    )?;

    if rows_affected == 0 {
        transaction.rollback()?;
        return Ok(false);
    }

    transaction.commit()?;

    Ok(true)
}

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            parent_id INTEGER,
            is_custom INTEGER NOT NULL DEFAULT 0,
            user_id INTEGER,
            UNIQUE (name, user_id),
            FOREIGN KEY(parent_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_category_default_name
            ON category(name) WHERE user_id IS NULL;
        CREATE INDEX IF NOT EXISTS idx_category_user_custom ON category(user_id, is_custom);",
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let name = CategoryName::new_unchecked(&raw_name);
    let description = row.get(2)?;
    let parent_id = row.get(3)?;
    let is_custom = row.get(4)?;
    let user_id = row.get(5)?;

    Ok(Category {
        id,
        name,
        description,
        parent_id,
        is_custom,
        user_id,
    })
}


#[cfg(test)]
mod custom_category_tests {
    use rusqlite::Connection;

    use crate::{
        category::{CategoryName, NewCustomCategory},
        db::StoreError,
    };

    use super::{
        CUSTOM_CATEGORY_LIMIT, count_custom_categories, create_category_table,
        create_custom_category, create_default_categories, delete_custom_category,
        get_categories_for_user, get_category,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        connection
            .pragma_update(None, "foreign_keys", true)
            .unwrap();
        create_category_table(&connection).expect("Could not create category table");
        connection
    }

    fn new_category(name: &str, user_id: i64) -> NewCustomCategory {
        NewCustomCategory::new(CategoryName::new_unchecked(name), user_id)
    }

    #[test]
    fn create_custom_category_succeeds() {
        let connection = get_test_connection();

        let category = create_custom_category(
            new_category("Coffee", 1).description(Some("Flat whites".to_owned())),
            &connection,
        )
        .expect("Could not create category");

        assert!(category.id > 0);
        assert_eq!(category.name, CategoryName::new_unchecked("Coffee"));
        assert_eq!(category.description.as_deref(), Some("Flat whites"));
        assert!(category.is_custom);
        assert_eq!(category.user_id, Some(1));
        assert_eq!(category.parent_id, None);
    }

    #[test]
    fn create_subcategory_stores_parent_id() {
        let connection = get_test_connection();
        let parent = create_custom_category(new_category("Food", 1), &connection)
            .expect("Could not create parent");

        let child = create_custom_category(
            new_category("Takeaways", 1).parent_id(Some(parent.id)),
            &connection,
        )
        .expect("Could not create child");

        assert_eq!(child.parent_id, Some(parent.id));
    }

    #[test]
    fn create_with_missing_parent_fails() {
        let connection = get_test_connection();

        let result =
            create_custom_category(new_category("Orphan", 1).parent_id(Some(999)), &connection);

        assert_eq!(result, Err(StoreError::InvalidParent(999)));
        assert_eq!(count_custom_categories(1, &connection), Ok(0));
    }

    #[test]
    fn duplicate_name_for_same_user_fails() {
        let connection = get_test_connection();
        create_custom_category(new_category("Coffee", 1), &connection)
            .expect("Could not create category");

        let result = create_custom_category(new_category("Coffee", 1), &connection);

        assert_eq!(result, Err(StoreError::DuplicateName("Coffee".to_owned())));
    }

    #[test]
    fn same_name_for_different_users_succeeds() {
        let connection = get_test_connection();
        create_custom_category(new_category("Coffee", 1), &connection)
            .expect("Could not create category for first user");

        let result = create_custom_category(new_category("Coffee", 2), &connection);

        assert!(result.is_ok());
    }

    #[test]
    fn custom_category_may_share_a_default_name() {
        let connection = get_test_connection();
        create_default_categories(&["Transport"], &connection).expect("Could not seed categories");

        let result = create_custom_category(new_category("Transport", 1), &connection);

        assert!(result.is_ok());
    }

    #[test]
    fn quota_is_enforced_at_the_limit() {
        let connection = get_test_connection();
        for i in 0..CUSTOM_CATEGORY_LIMIT {
            create_custom_category(new_category(&format!("Category {i}"), 1), &connection)
                .expect("Could not create category under the limit");
        }

        let result = create_custom_category(new_category("One too many", 1), &connection);

        assert_eq!(
            result,
            Err(StoreError::QuotaExceeded {
                limit: CUSTOM_CATEGORY_LIMIT
            })
        );
        assert_eq!(
            count_custom_categories(1, &connection),
            Ok(CUSTOM_CATEGORY_LIMIT)
        );
    }

    #[test]
    fn quota_is_counted_per_user() {
        let connection = get_test_connection();
        for i in 0..CUSTOM_CATEGORY_LIMIT {
            create_custom_category(new_category(&format!("Category {i}"), 1), &connection)
                .expect("Could not create category under the limit");
        }

        let result = create_custom_category(new_category("Category 0", 2), &connection);

        assert!(result.is_ok());
    }

    #[test]
    fn default_categories_do_not_count_towards_quota() {
        let connection = get_test_connection();
        create_default_categories(&["Transport", "Pets"], &connection)
            .expect("Could not seed categories");

        assert_eq!(count_custom_categories(1, &connection), Ok(0));
    }

    #[test]
    fn get_category_returns_none_for_missing_id() {
        let connection = get_test_connection();

        assert_eq!(get_category(42, &connection), Ok(None));
    }

    #[test]
    fn get_categories_for_user_includes_defaults_and_own_categories() {
        let connection = get_test_connection();
        create_default_categories(&["Transport"], &connection).expect("Could not seed categories");
        create_custom_category(new_category("Coffee", 1), &connection).unwrap();
        create_custom_category(new_category("Golf", 2), &connection).unwrap();

        let names: Vec<String> = get_categories_for_user(1, &connection)
            .expect("Could not get categories")
            .into_iter()
            .map(|category| category.name.to_string())
            .collect();

        assert_eq!(names, vec!["Coffee".to_owned(), "Transport".to_owned()]);
    }

    #[test]
    fn delete_custom_category_removes_subcategories() {
        let connection = get_test_connection();
        let parent = create_custom_category(new_category("Food", 1), &connection).unwrap();
        let child = create_custom_category(
            new_category("Takeaways", 1).parent_id(Some(parent.id)),
            &connection,
        )
        .unwrap();

        let deleted = delete_custom_category(parent.id, 1, &connection);

        assert_eq!(deleted, Ok(true));
        assert_eq!(get_category(child.id, &connection), Ok(None));
    }

    #[test]
    fn delete_custom_category_of_other_user_is_a_no_op() {
        let connection = get_test_connection();
        let category = create_custom_category(new_category("Coffee", 1), &connection).unwrap();

        let deleted = delete_custom_category(category.id, 2, &connection);

        assert_eq!(deleted, Ok(false));
        assert!(get_category(category.id, &connection).unwrap().is_some());
    }

    #[test]
    fn delete_default_category_is_a_no_op() {
        let connection = get_test_connection();
        create_default_categories(&["Transport"], &connection).unwrap();
        let default_id: i64 = connection
            .query_row("SELECT id FROM category WHERE name = 'Transport'", [], |row| {
                row.get(0)
            })
            .unwrap();

        assert_eq!(delete_custom_category(default_id, 1, &connection), Ok(false));
    }
}
