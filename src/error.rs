//! Errors for request validation and their mapping onto HTTP responses.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde_json::json;
use time::Date;

use crate::{expense::ServiceError, pool::PoolError};

/// A field value that fails the checks applied before it reaches storage.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    /// Amounts must be greater than zero.
    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),

    /// Amounts are stored with exactly two decimal places.
    #[error("amount {0} has more than {1} decimal places")]
    TooManyDecimalPlaces(Decimal, u32),

    /// Amounts are limited to a fixed number of digits in total.
    #[error("amount {0} has more than {1} digits in total")]
    TooManyDigits(Decimal, u32),

    /// A category name made only of whitespace, or no characters at all.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// The category name is longer than the limit given in the second field.
    #[error("category name is {0} characters long, the limit is {1}")]
    CategoryNameTooLong(usize, usize),

    /// The description is longer than the limit given in the second field.
    #[error("description is {0} characters long, the limit is {1}")]
    DescriptionTooLong(usize, usize),

    /// A date later than today was used for an expense.
    ///
    /// Expenses record money that has already been spent, so future dates
    /// are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),
}

/// The outcomes of a request that are not a success payload.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ApiError {
    /// The requested expense does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request body failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request body could not be read as the expected JSON.
    ///
    /// `status` is the code chosen by the JSON extractor, e.g. 400 for malformed
    /// JSON or 422 for a field of the wrong type.
    #[error("{message}")]
    InvalidBody {
        /// The status code to respond with.
        status: StatusCode,
        /// What was wrong with the body.
        message: String,
    },

    /// No database connection became available in time. The client may retry.
    #[error("the server is busy, try again later")]
    Unavailable,

    /// Something went wrong that the client cannot fix.
    ///
    /// The details are logged on the server and not sent to the client.
    #[error("an internal server error occurred")]
    Internal,
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::ExpenseNotFound(id) => {
                ApiError::NotFound(format!("Expense with id {id} not found"))
            }
            ServiceError::Database(message) => {
                tracing::error!("Responding with internal server error: {message}");
                ApiError::Internal
            }
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Exhausted(_) | PoolError::Closed => ApiError::Unavailable,
            error => {
                tracing::error!("Unexpected connection pool error: {error}");
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// A JSON request body whose rejections are reported as an [ApiError].
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidBody { status, .. } => *status,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod api_error_tests {
    use std::time::Duration;

    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{expense::ServiceError, pool::PoolError};

    use super::{ApiError, ValidationError};

    #[test]
    fn missing_expense_maps_to_not_found() {
        let error = ApiError::from(ServiceError::ExpenseNotFound(7));

        assert_eq!(error, ApiError::NotFound("Expense with id 7 not found".to_owned()));
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_error_maps_to_internal_error() {
        let error = ApiError::from(ServiceError::Database("disk I/O error".to_owned()));

        assert_eq!(error, ApiError::Internal);
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn exhausted_pool_maps_to_service_unavailable() {
        let error = ApiError::from(PoolError::Exhausted(Duration::from_secs(1)));

        assert_eq!(
            error.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn closed_pool_maps_to_service_unavailable() {
        let error = ApiError::from(PoolError::Closed);

        assert_eq!(error, ApiError::Unavailable);
        assert_eq!(
            error.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn invalid_body_keeps_status_and_uses_detail_shape() {
        let error = ApiError::InvalidBody {
            status: StatusCode::BAD_REQUEST,
            message: "Failed to parse the request body as JSON".to_owned(),
        };

        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Could not read response body");
        let body: serde_json::Value =
            serde_json::from_slice(&body).expect("Response body is not JSON");
        assert_eq!(
            body,
            serde_json::json!({ "detail": "Failed to parse the request body as JSON" })
        );
    }

    #[test]
    fn validation_error_maps_to_unprocessable_entity() {
        let error = ApiError::from(ValidationError::EmptyCategoryName);

        assert_eq!(
            error.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
