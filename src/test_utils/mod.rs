#![allow(missing_docs)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{http::header::SET_COOKIE, response::IntoResponse};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, Key},
};
use axum_test::{TestResponse, TestServer};
use rusqlite::Connection;
use time::macros::date;
use tokio::{net::TcpListener, task::JoinHandle};

use crate::{
    Account, AccountId, AccountStore, AppState, DashboardMetric, Error, NewUser, PasswordHash,
    ReconciliationClient, User, UserID, ValidatedPassword,
    auth::{DEFAULT_COOKIE_DURATION, Principal, set_auth_cookie},
    build_router, create_user,
    db::initialize,
    insert_account, insert_dashboard_metric,
};

/// The password of every user created with [TestApp::insert_user].
pub(crate) const TEST_PASSWORD: &str = "correct horse battery staple";

const TEST_COOKIE_SECRET: &str = "test-cookie-secret";
const TEST_RECONCILIATION_SECRET: &str = "test-reconciliation-secret";
/// Nothing listens on port 1, so reconciliations fail fast.
const UNREACHABLE_RECONCILIATION_URL: &str = "http://127.0.0.1:1";
const TEST_HASH_COST: u32 = 4;
/// How long the test reconciliation client waits for the job runner.
pub(crate) const TEST_RECONCILIATION_TIMEOUT: Duration = Duration::from_secs(2);

/// A test server running the full router over an in-memory database.
pub(crate) struct TestApp {
    pub server: TestServer,
    connection: Arc<Mutex<Connection>>,
    cookie_key: Key,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_reconciliation_url(UNREACHABLE_RECONCILIATION_URL)
    }

    pub fn with_reconciliation_url(url: &str) -> Self {
        let connection = Connection::open_in_memory().expect("Could not open in-memory database");
        let state = AppState::new(connection, TEST_COOKIE_SECRET, reconciliation_client(url))
            .expect("Could not create app state");

        Self::from_state(state)
    }

    pub fn with_account_store<A>(account_store: A) -> Self
    where
        A: AccountStore + Clone + Send + Sync + 'static,
    {
        let connection = Connection::open_in_memory().expect("Could not open in-memory database");
        initialize(&connection).expect("Could not create tables");
        let state = AppState::with_account_store(
            Arc::new(Mutex::new(connection)),
            TEST_COOKIE_SECRET,
            account_store,
            reconciliation_client(UNREACHABLE_RECONCILIATION_URL),
        );

        Self::from_state(state)
    }

    fn from_state<A>(state: AppState<A>) -> Self
    where
        A: AccountStore + Clone + Send + Sync + 'static,
    {
        let connection = state.db_connection.clone();
        let cookie_key = state.cookie_key.clone();
        let server = TestServer::try_new(build_router(state)).expect("Could not create test server.");

        Self {
            server,
            connection,
            cookie_key,
        }
    }

    /// Insert a user with the password [TEST_PASSWORD].
    pub fn insert_user(&self, email: &str) -> User {
        let name = email.split('@').next().unwrap_or(email).to_owned();
        let password_hash = PasswordHash::new(
            ValidatedPassword::new_unchecked(TEST_PASSWORD),
            TEST_HASH_COST,
        )
        .expect("Could not hash password");

        create_user(
            NewUser {
                name,
                email: email.to_owned(),
                image: None,
                password_hash,
            },
            &self.connection.lock().unwrap(),
        )
        .expect("Could not create user")
    }

    pub fn insert_account(&self, id: &str, owner_id: UserID, name: &str) -> Account {
        let account = Account {
            id: AccountId::new(id),
            owner_id,
            name: name.to_owned(),
            balance: 100.0,
            currency: "NZD".to_owned(),
            date: date!(2025 - 07 - 01),
        };

        insert_account(&account, &self.connection.lock().unwrap())
            .expect("Could not insert account");

        account
    }

    pub fn insert_metric(&self, account_id: &str, name: &str, value: f64) {
        insert_dashboard_metric(
            &AccountId::new(account_id),
            &DashboardMetric {
                name: name.to_owned(),
                value,
            },
            &self.connection.lock().unwrap(),
        )
        .expect("Could not insert metric");
    }

    /// A valid session cookie for `user`, as if they had just logged in.
    pub fn log_in_cookie(&self, user: &User) -> Cookie<'static> {
        self.session_cookie(&user.principal(), DEFAULT_COOKIE_DURATION)
    }

    /// A valid session cookie for a user that need not exist in the database.
    pub fn cookie_for_user_id(&self, id: UserID) -> Cookie<'static> {
        let principal = Principal {
            id,
            name: format!("User {id}"),
            email: format!("user{id}@example.com"),
            image: None,
        };

        self.session_cookie(&principal, DEFAULT_COOKIE_DURATION)
    }

    /// An encrypted session cookie for `principal` that expires after `duration`.
    pub fn session_cookie(
        &self,
        principal: &Principal,
        duration: time::Duration,
    ) -> Cookie<'static> {
        session_cookie_with_key(&self.cookie_key, principal, duration)
    }
}

/// Encrypt a session cookie for `principal` with `key`.
pub(crate) fn session_cookie_with_key(
    key: &Key,
    principal: &Principal,
    duration: time::Duration,
) -> Cookie<'static> {
    let jar = set_auth_cookie(PrivateCookieJar::new(key.clone()), principal.clone(), duration)
        .expect("Could not set auth cookie");
    let response = jar.into_response();
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("Missing Set-Cookie header")
        .to_str()
        .expect("Set-Cookie header is not ASCII")
        .to_owned();

    Cookie::parse(header)
        .expect("Could not parse Set-Cookie header")
        .into_owned()
}

fn reconciliation_client(url: &str) -> ReconciliationClient {
    ReconciliationClient::new(url, TEST_RECONCILIATION_SECRET, TEST_RECONCILIATION_TIMEOUT)
        .expect("Could not create reconciliation client")
}

/// A job runner that accepts connections and never answers.
///
/// Returns the base URL and the task holding the connections open. Abort the
/// task to close them.
pub(crate) async fn silent_job_runner() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Could not bind listener");
    let url = format!(
        "http://{}",
        listener.local_addr().expect("Listener has no address")
    );

    let handle = tokio::spawn(async move {
        let mut connections = Vec::new();

        while let Ok((stream, _)) = listener.accept().await {
            connections.push(stream);
        }
    });

    (url, handle)
}

#[track_caller]
pub(crate) fn assert_anonymous(response: &TestResponse) {
    response.assert_status_ok();
    assert_eq!(response.text(), "{}");
}

/// Poll `mock` until it has been matched or `timeout` elapses.
pub(crate) async fn wait_for_match(mock: &mockito::Mock, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if mock.matched_async().await {
            return true;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    mock.matched_async().await
}

/// An in-memory [AccountStore] that counts its reads.
#[derive(Debug, Clone)]
pub(crate) struct StubAccountStore {
    accounts: Vec<Account>,
    metrics: Vec<(AccountId, DashboardMetric)>,
    ignore_owner_filter: bool,
    fail: bool,
    account_reads: Arc<AtomicUsize>,
    metric_reads: Arc<AtomicUsize>,
}

impl StubAccountStore {
    pub fn new(accounts: Vec<Account>, metrics: Vec<(AccountId, DashboardMetric)>) -> Self {
        Self {
            accounts,
            metrics,
            ignore_owner_filter: false,
            fail: false,
            account_reads: Arc::new(AtomicUsize::new(0)),
            metric_reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return every account from [AccountStore::get_accounts_by_owner].
    pub fn ignoring_owner_filter(mut self) -> Self {
        self.ignore_owner_filter = true;
        self
    }

    /// Fail every read with [Error::DatabaseLockError].
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn metric_reads(&self) -> usize {
        self.metric_reads.load(Ordering::SeqCst)
    }

    pub fn total_reads(&self) -> usize {
        self.account_reads.load(Ordering::SeqCst) + self.metric_reads()
    }
}

impl AccountStore for StubAccountStore {
    fn get_accounts_by_owner(&self, owner_id: UserID) -> Result<Vec<Account>, Error> {
        self.account_reads.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(Error::DatabaseLockError);
        }

        Ok(self
            .accounts
            .iter()
            .filter(|account| self.ignore_owner_filter || account.owner_id == owner_id)
            .cloned()
            .collect())
    }

    fn get_account(&self, id: &AccountId) -> Result<Account, Error> {
        self.account_reads.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(Error::DatabaseLockError);
        }

        self.accounts
            .iter()
            .find(|account| &account.id == id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    fn get_dashboard_metrics(&self, id: &AccountId) -> Result<Vec<DashboardMetric>, Error> {
        self.metric_reads.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(Error::DatabaseLockError);
        }

        Ok(self
            .metrics
            .iter()
            .filter(|(account_id, _)| account_id == id)
            .map(|(_, metric)| metric.clone())
            .collect())
    }
}
