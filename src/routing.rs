//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::{
    AppState, Error,
    account::{AccountStore, get_account, get_accounts, get_dashboard, post_reconcile_account},
    auth::{get_session, post_log_in, post_log_out},
    endpoints,
    logging::logging_middleware,
};

/// Return a router with all the app's routes.
///
/// Account routes check the session themselves, so there is no separate
/// protected router.
pub fn build_router<A>(state: AppState<A>) -> Router
where
    A: AccountStore + Clone + Send + Sync + 'static,
{
    let auth_routes = Router::new()
        .route(endpoints::SESSION, get(get_session))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out));

    let account_routes = Router::new()
        .route(endpoints::ACCOUNTS, get(get_accounts::<A>))
        .route(endpoints::ACCOUNT, get(get_account::<A>))
        .route(endpoints::ACCOUNT_DASHBOARD, get(get_dashboard::<A>))
        .route(
            endpoints::RECONCILE_ACCOUNT,
            post(post_reconcile_account::<A>),
        );

    auth_routes
        .merge(account_routes)
        .route(endpoints::COFFEE, get(get_coffee))
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// Attempt to get a cup of coffee from the server.
async fn get_coffee() -> Response {
    (StatusCode::IM_A_TEAPOT, Json(json!({ "error": "I'm a teapot" }))).into_response()
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
