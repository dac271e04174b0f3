//! Creates the tables the application reads from.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    account::{create_account_table, create_dashboard_metric_table},
    user::create_user_table,
};

/// Create the user, account and account metric tables if they do not exist.
///
/// # Errors
/// Returns [Error::SqlError] if a table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_account_table(&transaction)?;
    create_dashboard_metric_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
