//! Resolves requests to a [Session] and serves the current session to clients.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    UserID,
    auth::{cookie::get_token_from_cookies, token::Token},
};

/// The authenticated identity behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The user's ID.
    pub id: UserID,
    /// The name shown on the dashboard.
    pub name: String,
    /// The user's email address.
    pub email: String,
    /// An optional URL to the user's avatar.
    pub image: Option<String>,
}

/// The session a request was made with.
///
/// A session either carries exactly one [Principal] or is anonymous. Being
/// anonymous is a normal outcome and not an error.
///
/// Handlers receive the session as an extractor and pass it on explicitly:
///
/// ```ignore
/// async fn handler(session: Session) -> Result<Json<Vec<Account>>, Error> {
///     let principal = require_authenticated(&session)?;
///     ...
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    token: Option<Token>,
}

impl Session {
    /// A session without a principal.
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    /// The principal of an authenticated session.
    pub fn principal(&self) -> Option<&Principal> {
        self.token.as_ref().map(|token| &token.principal)
    }

    /// When the session expires, if it is authenticated.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.token.as_ref().map(|token| token.expires_at)
    }

    /// Whether the session carries a principal.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Resolve the session stored in `jar` as of `now`.
///
/// Missing, forged, corrupted and expired tokens all resolve to an anonymous
/// session.
pub(crate) fn resolve_session(jar: &PrivateCookieJar, now: OffsetDateTime) -> Session {
    match get_token_from_cookies(jar) {
        Some(token) if token.is_live_at(now) => Session { token: Some(token) },
        Some(token) => {
            tracing::debug!(
                "Session for user {} expired at {}",
                token.principal.id,
                token.expires_at
            );
            Session::anonymous()
        }
        None => Session::anonymous(),
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state).await?;

        Ok(resolve_session(&jar, OffsetDateTime::now_utc()))
    }
}

/// The JSON shape of the current session.
///
/// An anonymous session serializes to `{}`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionResponse {
    /// The logged in user, absent for anonymous sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Principal>,

    /// When the session expires, absent for anonymous sessions.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires: Option<OffsetDateTime>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            user: session.principal().cloned(),
            expires: session.expires_at(),
        }
    }
}

/// Return the current session, authenticated or not.
pub async fn get_session(session: Session) -> Json<SessionResponse> {
    Json(SessionResponse::from(&session))
}
