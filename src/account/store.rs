//! Defines the account store trait and an implementation for the SQLite backend.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::{
    Error, UserID,
    account::core::{Account, AccountId, DashboardMetric, map_row_to_account},
};

/// Read access to persisted accounts.
///
/// The store does not know about sessions or ownership rules. Callers go
/// through [crate::account::query] which applies them.
pub trait AccountStore {
    /// Get the accounts owned by `owner_id`, ordered by name.
    ///
    /// Returns an empty vector if the user owns no accounts.
    fn get_accounts_by_owner(&self, owner_id: UserID) -> Result<Vec<Account>, Error>;

    /// Get the account with the id `id`, regardless of who owns it.
    ///
    /// Returns [Error::NotFound] if no such account exists.
    fn get_account(&self, id: &AccountId) -> Result<Account, Error>;

    /// Get the dashboard metrics of the account `id`, ordered by name.
    fn get_dashboard_metrics(&self, id: &AccountId) -> Result<Vec<DashboardMetric>, Error>;
}

/// Reads accounts from a shared SQLite connection.
#[derive(Debug, Clone)]
pub struct SQLiteAccountStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteAccountStore {
    /// Create a new account store.
    ///
    /// The `account` and `account_metric` tables must already exist, see
    /// [crate::initialize_db].
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)
    }
}

impl AccountStore for SQLiteAccountStore {
    /// # Errors
    ///
    /// Returns [Error::DatabaseLockError] if the lock is poisoned, or
    /// [Error::SqlError] if the query fails.
    fn get_accounts_by_owner(&self, owner_id: UserID) -> Result<Vec<Account>, Error> {
        let connection = self.lock()?;

        connection
            .prepare(
                "SELECT id, owner_id, name, balance, currency, date FROM account
                 WHERE owner_id = ?1
                 ORDER BY name COLLATE NOCASE ASC, id ASC",
            )?
            .query_map([owner_id.as_i64()], map_row_to_account)?
            .map(|account_result| account_result.map_err(Error::from))
            .collect()
    }

    fn get_account(&self, id: &AccountId) -> Result<Account, Error> {
        let connection = self.lock()?;

        connection
            .prepare(
                "SELECT id, owner_id, name, balance, currency, date FROM account WHERE id = ?1",
            )?
            .query_row([id], map_row_to_account)
            .map_err(Error::from)
    }

    fn get_dashboard_metrics(&self, id: &AccountId) -> Result<Vec<DashboardMetric>, Error> {
        let connection = self.lock()?;

        connection
            .prepare("SELECT name, value FROM account_metric WHERE account_id = ?1 ORDER BY name")?
            .query_map([id], |row| {
                Ok(DashboardMetric {
                    name: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .map(|metric_result| metric_result.map_err(Error::from))
            .collect()
    }
}
