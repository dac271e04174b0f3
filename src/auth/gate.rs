//! Allow or deny access by session and ownership.
//!
//! Checks run on every request and are never cached.

use crate::{
    Account, Error,
    auth::{Principal, Session},
};

/// Get the principal of an authenticated `session`.
///
/// # Errors
///
/// Returns [Error::Unauthenticated] for an anonymous session. Callers must
/// return the error without doing any further work.
pub fn require_authenticated(session: &Session) -> Result<&Principal, Error> {
    session.principal().ok_or(Error::Unauthenticated)
}

/// Check that `principal` owns `account`.
///
/// # Errors
///
/// Returns [Error::Forbidden] when the account belongs to someone else.
pub fn require_ownership(principal: &Principal, account: &Account) -> Result<(), Error> {
    if account.owner_id == principal.id {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

#[cfg(test)]
mod gate_tests {
    use time::macros::date;

    use crate::{
        Account, AccountId, Error, UserID,
        auth::{
            Principal, Session,
            gate::{require_authenticated, require_ownership},
        },
    };

    fn principal(id: i64) -> Principal {
        Principal {
            id: UserID::new(id),
            name: "Ada".to_owned(),
            email: "ada@example.com".to_owned(),
            image: None,
        }
    }

    fn account_owned_by(owner: i64) -> Account {
        Account {
            id: AccountId::new("acct-1"),
            owner_id: UserID::new(owner),
            name: "Everyday".to_owned(),
            balance: 12.5,
            currency: "NZD".to_owned(),
            date: date!(2025 - 01 - 01),
        }
    }

    #[test]
    fn anonymous_session_is_denied() {
        assert_eq!(
            require_authenticated(&Session::anonymous()),
            Err(Error::Unauthenticated)
        );
    }

    #[test]
    fn owner_is_allowed() {
        assert_eq!(require_ownership(&principal(1), &account_owned_by(1)), Ok(()));
    }

    #[test]
    fn other_user_is_denied() {
        assert_eq!(
            require_ownership(&principal(2), &account_owned_by(1)),
            Err(Error::Forbidden)
        );
    }
}
