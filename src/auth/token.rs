//! The token sealed inside the private session cookie.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::Principal;

/// The session payload for authentication and authorization.
///
/// The token is only ever stored encrypted, so the expiry inside it is the
/// one the server trusts. The expiry attribute on the cookie itself is set by
/// the client and is only a hint for the browser.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Token {
    pub principal: Principal,

    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Token {
    /// Whether the token is still valid at `now`.
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}
