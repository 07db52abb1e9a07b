//! Strawpoll backend: create a poll, vote once per network identity, watch
//! tallies update live.
//!
//! # Architecture
//! - [`store`] — durable entities (polls, options, the append-only vote
//!   ledger rows) behind the [`store::EntityStore`] contract, with memory
//!   and redis backends
//! - [`ledger`] — the dedup-and-increment vote protocol
//! - [`notifier`] — per-poll fan-out of option updates to live viewers
//! - [`session`] — the client-side replica and its vote state machine
//! - [`routes`] — the HTTP surface plus the per-poll WebSocket feed
//!
//! Votes are deduplicated by the caller's network origin address. That is a
//! deliberate, known-weak identity: good enough to stop casual double
//! voting, trivially spoofable by anyone who cares.

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};

use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod notifier;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod utils;

use routes::{create_poll_handler, live_handler, poll_handler, vote_handler};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/polls", post(create_poll_handler))
        .route("/polls/:poll_id", get(poll_handler))
        .route("/polls/:poll_id/vote/:option_id", post(vote_handler))
        .route("/polls/:poll_id/live", get(live_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
