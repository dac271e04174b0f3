//! The route handler for logging in with an email and password.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    account::AccountStore,
    auth::{
        cookie::{REMEMBER_ME_COOKIE_DURATION, set_auth_cookie},
        session::{SessionResponse, resolve_session},
    },
    user::get_user_by_email,
};

/// The state needed to perform a log-in.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The database connection used to look up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl<A> FromRef<AppState<A>> for AuthState
where
    A: AccountStore + Clone + Send + Sync,
{
    fn from_ref(state: &AppState<A>) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The credentials sent by the client to log in.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// The email the user registered with.
    pub email: String,
    /// The password in plain text, compared against the stored hash.
    pub password: String,
    /// Whether to extend the initial session duration to a week.
    #[serde(default)]
    pub remember_me: bool,
}

/// Handler for log-in requests.
///
/// On success the session cookie is set and the new session is returned.
///
/// # Errors
///
/// - [Error::InvalidCredentials] if the email is unknown or the password is wrong.
/// - [Error::DatabaseLockError] or [Error::SqlError] if the user could not be loaded.
/// - [Error::HashingError] if the stored password hash is malformed.
pub async fn post_log_in(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    Json(credentials): Json<LogInData>,
) -> Result<(PrivateCookieJar, Json<SessionResponse>), Error> {
    let user = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_email(&credentials.email, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::InvalidCredentials),
            Err(error) => return Err(error),
        }
    };

    let is_password_valid = user
        .password_hash
        .verify(&credentials.password)
        .inspect_err(|error| {
            tracing::error!("Unhandled error while verifying credentials: {error}")
        })?;

    if !is_password_valid {
        tracing::info!("Rejected log-in attempt for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

    let cookie_duration = if credentials.remember_me {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let jar = set_auth_cookie(jar, user.principal(), cookie_duration)
        .inspect_err(|error| tracing::error!("Error setting auth cookie: {error}"))?;
    let session = resolve_session(&jar, OffsetDateTime::now_utc());

    tracing::info!("User {} logged in", user.id);

    Ok((jar, Json(SessionResponse::from(&session))))
}
