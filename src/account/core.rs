use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, UserID};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// The opaque identifier of an account, e.g. "acct-42".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wrap an account identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for AccountId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for AccountId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value).map(AccountId)
    }
}

/// The amount of money available in a bank account or credit card.
///
/// Accounts are written by the ledger and only ever read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub owner_id: UserID,
    /// The display name of the account.
    pub name: String,
    /// The balance, in `currency`.
    pub balance: f64,
    /// The ISO 4217 code of the balance's currency, e.g. "NZD".
    pub currency: String,
    /// When the balance was last updated.
    #[serde(with = "iso_date")]
    pub date: Date,
}

/// A named figure derived from an account's history, e.g. the average
/// monthly spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetric {
    /// The metric's identifier, e.g. "monthly_income".
    pub name: String,
    /// The metric's value in the account's currency.
    pub value: f64,
}

/// An account together with its dashboard metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDashboard {
    /// The account being summarised.
    pub account: Account,
    /// The metrics derived for the account, ordered by name.
    pub metrics: Vec<DashboardMetric>,
}

pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id TEXT PRIMARY KEY,
            owner_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            balance REAL NOT NULL,
            currency TEXT NOT NULL,
            date TEXT NOT NULL,
            UNIQUE(owner_id, name)
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_owner ON account(owner_id)",
        (),
    )?;

    Ok(())
}

pub fn create_dashboard_metric_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account_metric (
            account_id TEXT NOT NULL REFERENCES account(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            value REAL NOT NULL,
            PRIMARY KEY(account_id, name)
        )",
        (),
    )?;

    Ok(())
}

pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        owner_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        balance: row.get(3)?,
        currency: row.get(4)?,
        date: row.get(5)?,
    })
}

/// Insert `account` into the database.
///
/// Used to seed databases; the service itself never writes accounts.
///
/// # Errors
/// Returns [Error::SqlError] if the id is taken, the owner already has an
/// account with the same name, or the query fails.
pub fn insert_account(account: &Account, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO account (id, owner_id, name, balance, currency, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            &account.id,
            account.owner_id.as_i64(),
            &account.name,
            account.balance,
            &account.currency,
            account.date,
        ),
    )?;

    Ok(())
}

/// Insert or replace a dashboard metric for the account `account_id`.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn insert_dashboard_metric(
    account_id: &AccountId,
    metric: &DashboardMetric,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT OR REPLACE INTO account_metric (account_id, name, value) VALUES (?1, ?2, ?3)",
        (account_id, &metric.name, metric.value),
    )?;

    Ok(())
}
