use std::{
    env::{self},
    fs::OpenOptions,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use balance_board::{
    AppState, DEFAULT_RECONCILIATION_TIMEOUT, ReconciliationClient, ReconciliationRequest,
    build_router, graceful_shutdown,
};

/// The REST API server for the balance dashboard.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Base URL of the job runner that recomputes balances, e.g. "http://localhost:8080".
    #[arg(long)]
    reconciliation_url: String,

    /// How many seconds to wait for the job runner before giving up.
    #[arg(long, default_value_t = DEFAULT_RECONCILIATION_TIMEOUT.as_secs())]
    reconciliation_timeout_secs: u64,

    /// If set, reconcile all accounts every this many seconds.
    #[arg(long)]
    reconciliation_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let secret = env::var("SECRET").expect("The environment variable 'SECRET' must be set");
    let reconciliation_secret = env::var("RECONCILIATION_SECRET")
        .expect("The environment variable 'RECONCILIATION_SECRET' must be set");

    let reconciliation_client = ReconciliationClient::new(
        &args.reconciliation_url,
        reconciliation_secret,
        Duration::from_secs(args.reconciliation_timeout_secs),
    )
    .expect("Could not create the reconciliation client");

    let conn = Connection::open(&args.db_path).expect("Could not open the database");
    let app_state = AppState::new(conn, &secret, reconciliation_client.clone())
        .expect("Could not initialize the database");

    if let Some(interval_secs) = args.reconciliation_interval_secs {
        tokio::spawn(reconcile_periodically(
            reconciliation_client,
            Duration::from_secs(interval_secs.max(1)),
        ));
    }

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(app_state));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly");
}

/// Ask the job runner to reconcile every account once per `period`.
async fn reconcile_periodically(client: ReconciliationClient, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        client.trigger(ReconciliationRequest::all()).detach();
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    // RUST_LOG overrides the stdout level, the log file always gets DEBUG and above.
    let stdout_filter = filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(stdout_log.with_filter(stdout_filter))
        .with(debug_log.with_filter(filter::LevelFilter::DEBUG))
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
