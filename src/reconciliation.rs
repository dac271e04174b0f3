//! Asks the external job runner to recompute account balances.
//!
//! Reconciliation is fire-and-forget from the point of view of a request
//! handler: [ReconciliationClient::trigger] dispatches the call on a
//! background task and returns immediately. Failures are logged and never
//! reach the user.

use std::{fmt, time::Duration};

use reqwest::{Client, Url};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::AccountId;

/// The path of the job runner's balance recomputation endpoint.
pub const RECALCULATE_BALANCES_PATH: &str = "/api/jobs/recalculate-balances";

/// How long to wait for the job runner before giving up.
pub const DEFAULT_RECONCILIATION_TIMEOUT: Duration = Duration::from_secs(10);

const ACCOUNT_ID_QUERY_PARAM: &str = "accountId";

/// What to reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationRequest {
    target: Option<AccountId>,
}

impl ReconciliationRequest {
    /// Recompute the balances of every account.
    ///
    /// Only the server itself issues these, never a user request.
    pub fn all() -> Self {
        Self { target: None }
    }

    /// Recompute the balance of a single account.
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            target: Some(account_id),
        }
    }

    /// The account to reconcile, or `None` for all accounts.
    pub fn target(&self) -> Option<&AccountId> {
        self.target.as_ref()
    }
}

impl fmt::Display for ReconciliationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(account_id) => write!(f, "account {account_id}"),
            None => f.write_str("all accounts"),
        }
    }
}

/// Why a reconciliation did not complete.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ReconciliationError {
    /// The client could not be built from its configuration.
    #[error("invalid reconciliation client configuration: {0}")]
    Configuration(String),

    /// The job runner did not answer within the timeout.
    #[error("the job runner did not respond within {0:?}")]
    Timeout(Duration),

    /// The job runner could not be reached.
    #[error("could not reach the job runner: {0}")]
    Network(String),

    /// The job runner answered with a non-success status.
    #[error("the job runner responded with status {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, for the logs.
        body: String,
    },

    /// The job runner answered with a body that is not JSON.
    #[error("the job runner responded with a malformed body: {0}")]
    MalformedBody(String),

    /// The background task running the call panicked or was cancelled.
    #[error("the reconciliation task failed: {0}")]
    TaskFailed(String),
}

/// The result of a dispatched reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// The job runner accepted the request. Holds its JSON response, or
    /// [Value::Null] if the response had no body.
    Completed(Value),
    /// The request did not succeed.
    Failed(ReconciliationError),
}

/// Sends reconciliation requests to the job runner.
///
/// Cloning is cheap, clones share the same connection pool.
#[derive(Clone)]
pub struct ReconciliationClient {
    client: Client,
    endpoint: Url,
    secret: String,
    timeout: Duration,
}

impl fmt::Debug for ReconciliationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ReconciliationClient {
    /// Create a client for the job runner at `base_url`, e.g. "http://localhost:8080".
    ///
    /// `secret` is sent as a bearer token with every request.
    ///
    /// # Errors
    /// Returns [ReconciliationError::Configuration] if `base_url` is not a
    /// valid URL or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ReconciliationError> {
        let endpoint = format!(
            "{}{RECALCULATE_BALANCES_PATH}",
            base_url.trim_end_matches('/')
        );
        let endpoint = Url::parse(&endpoint)
            .map_err(|error| ReconciliationError::Configuration(format!("{base_url}: {error}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ReconciliationError::Configuration(error.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            secret: secret.into(),
            timeout,
        })
    }

    /// The full URL that requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Dispatch `request` on a background task and return immediately.
    ///
    /// Must be called from within a tokio runtime. The outcome is logged
    /// either way; use the returned handle to wait for it.
    pub fn trigger(&self, request: ReconciliationRequest) -> PendingReconciliation {
        let client = self.clone();

        let handle = tokio::spawn(async move {
            tracing::debug!("Requesting reconciliation of {request}");

            match client.dispatch(&request).await {
                Ok(body) => {
                    tracing::info!("Reconciliation of {request} succeeded");
                    ReconciliationOutcome::Completed(body)
                }
                Err(error) => {
                    tracing::warn!("Reconciliation of {request} failed: {error}");
                    ReconciliationOutcome::Failed(error)
                }
            }
        });

        PendingReconciliation { handle }
    }

    /// Send `request` and wait for the job runner's answer.
    ///
    /// # Errors
    /// Returns a [ReconciliationError] describing why the call failed.
    pub async fn dispatch(
        &self,
        request: &ReconciliationRequest,
    ) -> Result<Value, ReconciliationError> {
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.secret);

        if let Some(account_id) = request.target() {
            builder = builder.query(&[(ACCOUNT_ID_QUERY_PARAM, account_id.as_str())]);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| self.classify(error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| self.classify(error))?;

        if !status.is_success() {
            return Err(ReconciliationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|error| ReconciliationError::MalformedBody(error.to_string()))
    }

    fn classify(&self, error: reqwest::Error) -> ReconciliationError {
        if error.is_timeout() {
            ReconciliationError::Timeout(self.timeout)
        } else {
            ReconciliationError::Network(error.to_string())
        }
    }
}

/// A reconciliation running in the background.
#[derive(Debug)]
#[must_use = "call `detach` to let the reconciliation run unobserved"]
pub struct PendingReconciliation {
    handle: JoinHandle<ReconciliationOutcome>,
}

impl PendingReconciliation {
    /// Stop observing the reconciliation. It keeps running to completion.
    pub fn detach(self) {}

    /// Wait for the reconciliation to finish.
    pub async fn outcome(self) -> ReconciliationOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!("Reconciliation task failed: {error}");
                ReconciliationOutcome::Failed(ReconciliationError::TaskFailed(error.to_string()))
            }
        }
    }
}
