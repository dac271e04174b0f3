//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/accounts/{account_id}', use [format_endpoint].

use std::fmt::Display;

/// The route for reading the current session.
pub const SESSION: &str = "/api/auth/session";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/auth/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/auth/log_out";
/// The route to list the accounts of the logged in user.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route to access a single account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";
/// The route to access the dashboard summary of an account.
pub const ACCOUNT_DASHBOARD: &str = "/api/accounts/{account_id}/dashboard";
/// The route to request the reconciliation of an account's balance.
pub const RECONCILE_ACCOUNT: &str = "/api/accounts/{account_id}/reconcile";
/// The route to request a cup of coffee (experimental).
pub const COFFEE: &str = "/api/coffee";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: impl Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
