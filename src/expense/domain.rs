//! Core expense domain types and the request bodies they are built from.

use std::fmt::Display;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{ValidationError, category::CategoryName};

/// Database identifier for an expense.
pub type ExpenseId = i64;

/// The longest description allowed, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 255;

/// A strictly positive amount of money with exactly two decimal places and
/// at most [Amount::MAX_DIGITS] digits in total.
///
/// Amounts are fixed-point decimals, so `100.50` is stored and read back as
/// exactly `100.50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// The number of decimal places kept for every amount.
    pub const DECIMAL_PLACES: u32 = 2;
    /// The most digits an amount may have, counting both sides of the decimal point.
    pub const MAX_DIGITS: u32 = 10;

    /// Create an amount from `value`.
    ///
    /// # Errors
    ///
    /// This function will return a:
    /// - [ValidationError::NonPositiveAmount] if `value` is zero or negative,
    /// - [ValidationError::TooManyDecimalPlaces] if `value` has significant digits past the second decimal place,
    /// - or [ValidationError::TooManyDigits] if `value` needs more than [Amount::MAX_DIGITS] digits.
    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(value));
        }

        if value.normalize().scale() > Self::DECIMAL_PLACES {
            return Err(ValidationError::TooManyDecimalPlaces(
                value,
                Self::DECIMAL_PLACES,
            ));
        }

        let integer_digits = Self::MAX_DIGITS - Self::DECIMAL_PLACES;
        if value.trunc() >= Decimal::from(10_i64.pow(integer_digits)) {
            return Err(ValidationError::TooManyDigits(value, Self::MAX_DIGITS));
        }

        Ok(Self::new_unchecked(value))
    }

    /// Create an amount without validation, rounding it to two decimal places.
    ///
    /// The caller should ensure that `value` is positive and within the digit limit.
    pub fn new_unchecked(mut value: Decimal) -> Self {
        value.rescale(Self::DECIMAL_PLACES);
        Self(value)
    }

    /// The amount as a decimal with two decimal places.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money that has been spent, recorded against a category on a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// The ID of the expense, assigned by the database and never reused.
    pub id: ExpenseId,
    /// How much was spent.
    pub amount: Amount,
    /// The name of the category the expense belongs to.
    pub category: CategoryName,
    /// A free text note about what the money was spent on.
    pub description: Option<String>,
    /// When the money was spent.
    pub date: Date,
    /// When the expense was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the expense was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The validated fields of an expense that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    /// How much was spent.
    pub amount: Amount,
    /// The name of the category the expense belongs to.
    pub category: CategoryName,
    /// A free text note about what the money was spent on.
    pub description: Option<String>,
    /// When the money was spent.
    pub date: Date,
}

impl NewExpense {
    /// An expense with no description.
    pub fn new(amount: Amount, category: CategoryName, date: Date) -> Self {
        Self {
            amount,
            category,
            description: None,
            date,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// The validated fields to change on an existing expense.
///
/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseUpdate {
    /// The new amount.
    pub amount: Option<Amount>,
    /// The new category name.
    pub category: Option<CategoryName>,
    /// The new description. There is no way to remove a description.
    pub description: Option<String>,
    /// The new date.
    pub date: Option<Date>,
}

impl ExpenseUpdate {
    /// Whether the update would leave every field unchanged.
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.date.is_none()
    }
}

/// Request body for creating an expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseForm {
    /// How much was spent, e.g. "100.50".
    pub amount: Decimal,
    /// The name of the category the expense belongs to.
    pub category: String,
    /// An optional note about what the money was spent on.
    #[serde(default)]
    pub description: Option<String>,
    /// When the money was spent, e.g. "2024-01-15".
    pub date: Date,
}

impl ExpenseForm {
    /// Check every field and convert the form into a [NewExpense].
    ///
    /// `today` is the current date in the server's local timezone.
    ///
    /// # Errors
    /// Returns the first [ValidationError] found.
    pub fn validate(self, today: Date) -> Result<NewExpense, ValidationError> {
        Ok(NewExpense {
            amount: Amount::new(self.amount)?,
            category: CategoryName::new(&self.category)?,
            description: self.description.map(validate_description).transpose()?,
            date: validate_date(self.date, today)?,
        })
    }
}

/// Request body for a partial update of an expense.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseUpdateForm {
    /// The new amount, if it should change.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// The new category name, if it should change.
    #[serde(default)]
    pub category: Option<String>,
    /// The new description, if it should change.
    #[serde(default)]
    pub description: Option<String>,
    /// The new date, if it should change.
    #[serde(default)]
    pub date: Option<Date>,
}

impl ExpenseUpdateForm {
    /// Check the fields that were given and convert the form into an [ExpenseUpdate].
    ///
    /// # Errors
    /// Returns the first [ValidationError] found.
    pub fn validate(self, today: Date) -> Result<ExpenseUpdate, ValidationError> {
        Ok(ExpenseUpdate {
            amount: self.amount.map(Amount::new).transpose()?,
            category: self
                .category
                .map(|name| CategoryName::new(&name))
                .transpose()?,
            description: self.description.map(validate_description).transpose()?,
            date: self
                .date
                .map(|date| validate_date(date, today))
                .transpose()?,
        })
    }
}

fn validate_description(description: String) -> Result<String, ValidationError> {
    let length = description.chars().count();

    if length > MAX_DESCRIPTION_LENGTH {
        Err(ValidationError::DescriptionTooLong(
            length,
            MAX_DESCRIPTION_LENGTH,
        ))
    } else {
        Ok(description)
    }
}

fn validate_date(date: Date, today: Date) -> Result<Date, ValidationError> {
    if date > today {
        Err(ValidationError::FutureDate(date))
    } else {
        Ok(date)
    }
}
