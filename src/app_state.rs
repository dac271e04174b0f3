//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error,
    account::{AccountStore, SQLiteAccountStore},
    auth::DEFAULT_COOKIE_DURATION,
    db::initialize,
    reconciliation::ReconciliationClient,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState<A>
where
    A: AccountStore + Clone + Send + Sync,
{
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The database connection, used for user lookups.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The store for reading accounts.
    pub account_store: A,

    /// The client for requesting balance reconciliation.
    pub reconciliation_client: ReconciliationClient,
}

impl AppState<SQLiteAccountStore> {
    /// Create a new [AppState] backed by a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        reconciliation_client: ReconciliationClient,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let connection = Arc::new(Mutex::new(db_connection));

        Ok(Self::with_account_store(
            connection.clone(),
            cookie_secret,
            SQLiteAccountStore::new(connection),
            reconciliation_client,
        ))
    }
}

impl<A> AppState<A>
where
    A: AccountStore + Clone + Send + Sync,
{
    /// Create a new [AppState] that reads accounts from `account_store`.
    ///
    /// The tables in `db_connection` must already exist.
    pub fn with_account_store(
        db_connection: Arc<Mutex<Connection>>,
        cookie_secret: &str,
        account_store: A,
        reconciliation_client: ReconciliationClient,
    ) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            db_connection,
            account_store,
            reconciliation_client,
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl<A> FromRef<AppState<A>> for Key
where
    A: AccountStore + Clone + Send + Sync,
{
    fn from_ref(state: &AppState<A>) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
