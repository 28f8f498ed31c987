//! Core category domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// The longest category name allowed, in characters.
pub const MAX_CATEGORY_NAME_LENGTH: usize = 100;

/// A validated category name, 1 to [MAX_CATEGORY_NAME_LENGTH] characters long.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(try_from = "String")]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name from `name` with surrounding whitespace removed.
    ///
    /// # Errors
    ///
    /// This function will return a:
    /// - [ValidationError::EmptyCategoryName] if `name` is empty or only whitespace,
    /// - or [ValidationError::CategoryNameTooLong] if `name` has more than
    ///   [MAX_CATEGORY_NAME_LENGTH] characters.
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        let length = name.chars().count();

        if length == 0 {
            Err(ValidationError::EmptyCategoryName)
        } else if length > MAX_CATEGORY_NAME_LENGTH {
            Err(ValidationError::CategoryNameTooLong(
                length,
                MAX_CATEGORY_NAME_LENGTH,
            ))
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty and within the length limit.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl TryFrom<String> for CategoryName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CategoryName::new(&value)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database identifier for a category.
pub type CategoryId = i64;

/// Identifier of the user that owns a custom category.
pub type UserId = i64;

/// A category for grouping expenses, e.g. 'Transport' or 'Groceries'.
///
/// Default categories are seeded by the system and have no owner. Custom
/// categories are created by a user and count towards that user's limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The name of the category, unique among the owner's categories.
    pub name: CategoryName,
    /// What the category is for.
    pub description: Option<String>,
    /// The ID of the parent category, if this is a subcategory.
    pub parent_id: Option<CategoryId>,
    /// Whether a user created the category.
    pub is_custom: bool,
    /// The user that owns the category. Default categories have no owner.
    pub user_id: Option<UserId>,
}

/// The data needed to create a custom category for a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomCategory {
    /// The name of the new category.
    pub name: CategoryName,
    /// What the category is for.
    pub description: Option<String>,
    /// The ID of an existing category to nest the new category under.
    pub parent_id: Option<CategoryId>,
    /// The user that will own the category.
    pub user_id: UserId,
}

impl NewCustomCategory {
    /// A top level category with no description owned by `user_id`.
    pub fn new(name: CategoryName, user_id: UserId) -> Self {
        Self {
            name,
            description: None,
            parent_id: None,
            user_id,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set the parent category.
    pub fn parent_id(mut self, parent_id: Option<CategoryId>) -> Self {
        self.parent_id = parent_id;
        self
    }
}
