//! Reading and writing the encrypted session cookie.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{Principal, token::Token},
};

pub(crate) const COOKIE_TOKEN: &str = "token";
/// The default duration for which auth cookies are valid.
pub(crate) const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(5);
/// How long the auth cookie lasts if the user selects "remember me" at log-in.
pub(crate) const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// Add an auth cookie for `principal` to the cookie jar.
///
/// The token inside the cookie expires `duration` from the current time.
///
/// # Errors
///
/// Returns [Error::InvalidDateFormat] if the expiry overflows or the token
/// cannot be serialized.
pub(crate) fn set_auth_cookie(
    jar: PrivateCookieJar,
    principal: Principal,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let expires_at = OffsetDateTime::now_utc()
        .checked_add(duration)
        .ok_or_else(|| Error::InvalidDateFormat(format!("now + {duration} overflowed")))?;
    let token = Token {
        principal,
        expires_at,
    };
    let token_string =
        serde_json::to_string(&token).map_err(|error| Error::TokenEncoding(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_TOKEN, token_string))
            .path("/")
            .expires(expires_at)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    ))
}

/// Overwrite the auth cookie with an invalid value and set its max age to
/// zero, which deletes the cookie on the client side.
///
/// Safe to call on a jar that has no auth cookie.
pub(crate) fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .path("/")
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Decrypt and parse the token in `jar`.
///
/// Returns `None` when the cookie is missing, was not encrypted with our key,
/// or does not hold a token. Expiry is not checked here.
pub(crate) fn get_token_from_cookies(jar: &PrivateCookieJar) -> Option<Token> {
    let cookie = jar.get(COOKIE_TOKEN)?;

    serde_json::from_str(cookie.value_trimmed())
        .inspect_err(|error| tracing::debug!("Discarding unparsable session token: {error}"))
        .ok()
}
