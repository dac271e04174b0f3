//! Log-out route handler that destroys the client-held session.

use axum::{http::StatusCode, response::IntoResponse};
use axum_extra::extract::PrivateCookieJar;

use crate::auth::cookie::invalidate_auth_cookie;

/// Invalidate the session cookie.
///
/// Always succeeds, including for clients that are already logged out.
pub async fn post_log_out(jar: PrivateCookieJar) -> impl IntoResponse {
    (invalidate_auth_cookie(jar), StatusCode::NO_CONTENT)
}
