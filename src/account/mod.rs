//! Bank accounts, their dashboard metrics and the ownership-scoped queries
//! over them.

mod core;
mod handlers;
mod query;
mod store;

pub use core::{
    Account, AccountDashboard, AccountId, DashboardMetric, create_account_table,
    create_dashboard_metric_table, insert_account, insert_dashboard_metric,
};
pub use handlers::{
    AccountState, ReconciliationAccepted, get_account, get_accounts, get_dashboard,
    post_reconcile_account,
};
pub use query::{get_account_dashboard, get_account_detail, list_accounts};
pub use store::{AccountStore, SQLiteAccountStore};
