//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/expenses/{expense_id}', use [format_endpoint].

/// The root route, which reports that the server is running.
pub const ROOT: &str = "/";
/// The route for health checks.
pub const HEALTH: &str = "/health";
/// The route to create and list expenses.
pub const EXPENSES: &str = "/expenses";
/// The route to get, update and delete a single expense.
pub const EXPENSE: &str = "/expenses/{expense_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter starts with a left brace and ends with a right brace, e.g.
/// '{expense_id}' in '/expenses/{expense_id}'. Only the first parameter is
/// replaced. If there is no parameter, `endpoint_path` is returned unchanged.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{id}{}",
        &endpoint_path[..param_start],
        &endpoint_path[param_end..]
    )
}

#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::ROOT);
        assert_endpoint_is_valid_uri(endpoints::HEALTH);
        assert_endpoint_is_valid_uri(endpoints::EXPENSES);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::EXPENSE, 1));
    }

    #[test]
    fn replaces_parameter() {
        let formatted_path = format_endpoint(endpoints::EXPENSE, 42);

        assert_eq!(formatted_path, "/expenses/42");
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint(endpoints::EXPENSES, 1);

        assert_eq!(formatted_path, "/expenses");
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/expenses/{expense_id}/receipt", 1);

        assert_eq!(formatted_path, "/expenses/1/receipt");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
