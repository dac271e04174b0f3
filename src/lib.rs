//! Balance Board is the backend for an account-balance dashboard.
//!
//! This library provides a JSON API that lets an authenticated user list the
//! financial accounts they own, look at a single account or its dashboard
//! summary, and ask an external job runner to recompute balances.
//!
//! Sessions live entirely in an encrypted cookie held by the client, so any
//! server process with the same secret can resolve any request.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod db;
pub mod endpoints;
mod logging;
mod password;
mod reconciliation;
mod routing;
mod user;

#[cfg(test)]
mod test_utils;

pub use account::{
    Account, AccountDashboard, AccountId, AccountState, AccountStore, DashboardMetric,
    ReconciliationAccepted, SQLiteAccountStore, get_account_dashboard, get_account_detail,
    insert_account, insert_dashboard_metric, list_accounts,
};
pub use app_state::{AppState, create_cookie_key};
pub use auth::{
    AuthState, LogInData, Principal, Session, SessionResponse, require_authenticated,
    require_ownership,
};
pub use db::initialize as initialize_db;
pub use logging::{BODY_SIZE_LIMIT, LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use password::{PasswordHash, ValidatedPassword};
pub use reconciliation::{
    DEFAULT_RECONCILIATION_TIMEOUT, PendingReconciliation, ReconciliationClient,
    ReconciliationError, ReconciliationOutcome, ReconciliationRequest,
};
pub use routing::build_router;
pub use user::{NewUser, User, UserID, create_user, get_user_by_email};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The message sent to the client for both missing and foreign resources.
pub(crate) const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request did not carry a valid session.
    ///
    /// Handlers must stop before touching any data when they see this error.
    #[error("authentication required")]
    Unauthenticated,

    /// The principal does not own the requested resource.
    ///
    /// Rendered exactly like [Error::NotFound] so that clients cannot probe
    /// for the existence of other users' accounts.
    #[error("the resource is owned by another user")]
    Forbidden,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The email and password combination did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The expiry date of a session token could not be computed.
    ///
    /// Callers should pass in the original error as a string.
    #[error("could not compute the session expiry: {0}")]
    InvalidDateFormat(String),

    /// A session token could not be serialized for its cookie.
    #[error("could not encode the session token: {0}")]
    TokenEncoding(String),

    /// The request body is larger than the server will buffer.
    #[error("request body too large")]
    PayloadTooLarge,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::TooWeak(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            // Both outcomes share a body so that foreign accounts look absent.
            Error::NotFound | Error::Forbidden => {
                (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_owned())
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an unexpected error occurred, check the server logs for more details"
                        .to_owned(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
