//! Ownership-scoped reads of accounts.
//!
//! Every function takes the acting [Principal] explicitly and never returns
//! an account that the principal does not own.

use crate::{
    Error,
    account::{
        core::{Account, AccountDashboard, AccountId},
        store::AccountStore,
    },
    auth::{Principal, require_ownership},
};

/// List the accounts owned by `principal`, ordered by name ignoring case.
///
/// # Errors
/// Returns the store's error if the accounts could not be loaded.
pub fn list_accounts<S>(principal: &Principal, store: &S) -> Result<Vec<Account>, Error>
where
    S: AccountStore + ?Sized,
{
    let mut accounts = store.get_accounts_by_owner(principal.id)?;

    accounts.retain(|account| account.owner_id == principal.id);
    accounts.sort_by_cached_key(|account| account.name.to_lowercase());

    Ok(accounts)
}

/// Get the account `account_id` if `principal` owns it.
///
/// # Errors
/// - [Error::NotFound] if the account does not exist.
/// - [Error::Forbidden] if someone else owns the account.
/// - The store's error if the account could not be loaded.
pub fn get_account_detail<S>(
    principal: &Principal,
    account_id: &AccountId,
    store: &S,
) -> Result<Account, Error>
where
    S: AccountStore + ?Sized,
{
    let account = store.get_account(account_id).inspect_err(|error| {
        if *error == Error::NotFound {
            tracing::debug!("User {} requested missing account {account_id}", principal.id);
        }
    })?;

    require_ownership(principal, &account).inspect_err(|_| {
        tracing::warn!(
            "User {} requested account {account_id} owned by user {}",
            principal.id,
            account.owner_id
        )
    })?;

    Ok(account)
}

/// Get the dashboard summary of the account `account_id` if `principal` owns it.
///
/// # Errors
/// Same as [get_account_detail]. The metrics are only read after the
/// ownership check passes.
pub fn get_account_dashboard<S>(
    principal: &Principal,
    account_id: &AccountId,
    store: &S,
) -> Result<AccountDashboard, Error>
where
    S: AccountStore + ?Sized,
{
    let account = get_account_detail(principal, account_id, store)?;
    let metrics = store.get_dashboard_metrics(&account.id)?;

    Ok(AccountDashboard { account, metrics })
}
