//! Route handlers for reading accounts and triggering their reconciliation.

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    account::{
        core::{Account, AccountDashboard, AccountId},
        query::{get_account_dashboard, get_account_detail, list_accounts},
        store::AccountStore,
    },
    auth::{Session, require_authenticated},
    reconciliation::{ReconciliationClient, ReconciliationRequest},
};

/// The state needed by the account route handlers.
#[derive(Debug, Clone)]
pub struct AccountState<A>
where
    A: AccountStore + Clone + Send + Sync,
{
    /// Where accounts are read from.
    pub account_store: A,
    /// Where balance recomputations are requested.
    pub reconciliation_client: ReconciliationClient,
}

impl<A> FromRef<AppState<A>> for AccountState<A>
where
    A: AccountStore + Clone + Send + Sync,
{
    fn from_ref(state: &AppState<A>) -> Self {
        Self {
            account_store: state.account_store.clone(),
            reconciliation_client: state.reconciliation_client.clone(),
        }
    }
}

/// List the accounts of the logged in user.
pub async fn get_accounts<A>(
    State(state): State<AccountState<A>>,
    session: Session,
) -> Result<Json<Vec<Account>>, Error>
where
    A: AccountStore + Clone + Send + Sync,
{
    let principal = require_authenticated(&session)?;

    let accounts = list_accounts(principal, &state.account_store)
        .inspect_err(|error| tracing::error!("could not list accounts: {error}"))?;

    Ok(Json(accounts))
}

/// Get one account of the logged in user.
pub async fn get_account<A>(
    State(state): State<AccountState<A>>,
    session: Session,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Account>, Error>
where
    A: AccountStore + Clone + Send + Sync,
{
    let principal = require_authenticated(&session)?;

    get_account_detail(principal, &account_id, &state.account_store).map(Json)
}

/// Get the dashboard summary of one account of the logged in user.
///
/// A reconciliation of the account is triggered after the summary has been
/// read, so the next request sees fresher balances. The response does not
/// depend on whether that reconciliation succeeds.
pub async fn get_dashboard<A>(
    State(state): State<AccountState<A>>,
    session: Session,
    Path(account_id): Path<AccountId>,
) -> Result<Json<AccountDashboard>, Error>
where
    A: AccountStore + Clone + Send + Sync,
{
    let principal = require_authenticated(&session)?;

    let dashboard = get_account_dashboard(principal, &account_id, &state.account_store)?;

    state
        .reconciliation_client
        .trigger(ReconciliationRequest::for_account(dashboard.account.id.clone()))
        .detach();

    Ok(Json(dashboard))
}

/// The response to an accepted reconciliation request.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReconciliationAccepted {
    /// The account whose balance will be recomputed.
    pub account_id: AccountId,
}

/// Ask for the balance of one account of the logged in user to be recomputed.
///
/// Responds with 202 Accepted as soon as the request has been dispatched.
pub async fn post_reconcile_account<A>(
    State(state): State<AccountState<A>>,
    session: Session,
    Path(account_id): Path<AccountId>,
) -> Result<(StatusCode, Json<ReconciliationAccepted>), Error>
where
    A: AccountStore + Clone + Send + Sync,
{
    let principal = require_authenticated(&session)?;

    let account = get_account_detail(principal, &account_id, &state.account_store)?;

    state
        .reconciliation_client
        .trigger(ReconciliationRequest::for_account(account.id.clone()))
        .detach();

    Ok((
        StatusCode::ACCEPTED,
        Json(ReconciliationAccepted {
            account_id: account.id,
        }),
    ))
}



#[cfg(test)]
mod get_dashboard_tests {
    use std::time::Duration;

    use axum::http::StatusCode;

    use crate::{
        AccountDashboard,
        endpoints::{self, format_endpoint},
        reconciliation::RECALCULATE_BALANCES_PATH,
        test_utils::{TEST_RECONCILIATION_TIMEOUT, TestApp, silent_job_runner, wait_for_match},
    };

    #[tokio::test]
    async fn owner_gets_dashboard_and_triggers_reconciliation() {
        let mut downstream = mockito::Server::new_async().await;
        let mock = downstream
            .mock("POST", RECALCULATE_BALANCES_PATH)
            .match_query(mockito::Matcher::UrlEncoded(
                "accountId".into(),
                "acct-42".into(),
            ))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let app = TestApp::with_reconciliation_url(&downstream.url());
        let ada = app.insert_user("ada@example.com");
        app.insert_account("acct-42", ada.id, "Savings");
        app.insert_metric("acct-42", "monthly_income", 1200.0);

        let response = app
            .server
            .get(&format_endpoint(endpoints::ACCOUNT_DASHBOARD, "acct-42"))
            .add_cookie(app.log_in_cookie(&ada))
            .await;

        response.assert_status_ok();
        let dashboard: AccountDashboard = response.json();
        assert_eq!(dashboard.account.name, "Savings");
        assert_eq!(dashboard.metrics[0].value, 1200.0);
        assert!(wait_for_match(&mock, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn foreign_dashboard_is_not_found_and_triggers_nothing() {
        let mut downstream = mockito::Server::new_async().await;
        let mock = downstream
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let app = TestApp::with_reconciliation_url(&downstream.url());
        let ada = app.insert_user("ada@example.com");
        let eve = app.insert_user("eve@example.com");
        app.insert_account("acct-42", ada.id, "Savings");

        let response = app
            .server
            .get(&format_endpoint(endpoints::ACCOUNT_DASHBOARD, "acct-42"))
            .add_cookie(app.log_in_cookie(&eve))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        tokio::time::sleep(Duration::from_millis(100)).await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failing_reconciliation_does_not_change_response() {
        let mut healthy = mockito::Server::new_async().await;
        healthy
            .mock("POST", RECALCULATE_BALANCES_PATH)
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let mut broken = mockito::Server::new_async().await;
        broken
            .mock("POST", RECALCULATE_BALANCES_PATH)
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let mut responses = Vec::new();
        for url in [healthy.url(), broken.url(), "http://127.0.0.1:1".to_owned()] {
            let app = TestApp::with_reconciliation_url(&url);
            let ada = app.insert_user("ada@example.com");
            app.insert_account("acct-42", ada.id, "Savings");

            let response = app
                .server
                .get(&format_endpoint(endpoints::ACCOUNT_DASHBOARD, "acct-42"))
                .add_cookie(app.log_in_cookie(&ada))
                .await;

            responses.push((response.status_code(), response.text()));
        }

        assert_eq!(responses[0].0, StatusCode::OK);
        assert_eq!(responses[0], responses[1]);
        assert_eq!(responses[0], responses[2]);
    }

    #[tokio::test]
    async fn silent_job_runner_does_not_delay_response() {
        let mut healthy = mockito::Server::new_async().await;
        healthy
            .mock("POST", RECALCULATE_BALANCES_PATH)
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let (silent_url, silent) = silent_job_runner().await;

        let mut responses = Vec::new();
        for url in [healthy.url(), silent_url] {
            let app = TestApp::with_reconciliation_url(&url);
            let ada = app.insert_user("ada@example.com");
            app.insert_account("acct-42", ada.id, "Savings");
            app.insert_metric("acct-42", "monthly_income", 1200.0);
            let cookie = app.log_in_cookie(&ada);

            let started = tokio::time::Instant::now();
            let response = app
                .server
                .get(&format_endpoint(endpoints::ACCOUNT_DASHBOARD, "acct-42"))
                .add_cookie(cookie)
                .await;

            responses.push((response.status_code(), response.text(), started.elapsed()));
        }
        silent.abort();

        let (healthy_status, healthy_body, _) = &responses[0];
        let (silent_status, silent_body, silent_elapsed) = &responses[1];
        assert_eq!(*healthy_status, StatusCode::OK);
        assert_eq!(silent_status, healthy_status);
        assert_eq!(silent_body, healthy_body);
        assert!(
            *silent_elapsed < TEST_RECONCILIATION_TIMEOUT / 2,
            "response took {silent_elapsed:?}"
        );
    }
}
