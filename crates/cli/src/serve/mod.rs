//! `custody serve` -- HTTP JSON API over the custody ledger.
//!
//! Endpoints:
//! - GET  /health                  - Server status
//! - GET  /batches                 - List batches (`?status=`, `?custodian=`)
//! - GET  /batches/{id}            - Stored record of one batch
//! - POST /batches                 - Register a batch
//! - POST /batches/{id}/transfer   - Hand custody to `{"to"}`
//! - POST /batches/{id}/deliver    - Confirm receipt by the current custodian
//! - POST /batches/{id}/recall     - Recall with `{"reason"}`
//!
//! Mutating endpoints identify the caller by the `X-Caller-Credential`
//! header. Errors are `{"error": message, "kind": kind}`.

mod handlers;
mod middleware;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use custody_storage::{CustodyStorage, FileStorage};

use self::handlers::{
    handle_deliver, handle_health, handle_list_batches, handle_not_found, handle_recall,
    handle_register, handle_track, handle_transfer,
};
use self::middleware::trace_requests;
use self::state::AppState;
use crate::commands::build_ledger;
use crate::config::Config;

/// Maximum request body size: 64 KB.
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, kind: &str, message: &str) -> impl IntoResponse {
    (
        status,
        Json(serde_json::json!({"error": message, "kind": kind})),
    )
}

/// Assemble the API router over any storage backend.
pub(crate) fn router<S: CustodyStorage>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/batches",
            get(handle_list_batches::<S>).post(handle_register::<S>),
        )
        .route("/batches/{id}", get(handle_track::<S>))
        .route("/batches/{id}/transfer", post(handle_transfer::<S>))
        .route("/batches/{id}/deliver", post(handle_deliver::<S>))
        .route("/batches/{id}/recall", post(handle_recall::<S>))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn(trace_requests))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server over the file store at `store_path`.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub(crate) async fn start_server(
    config: &Config,
    store_path: PathBuf,
    port: u16,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = FileStorage::open(&store_path)?;
    let ledger = build_ledger(config, storage);
    let app = router(Arc::new(AppState { ledger }));

    eprintln!("Store: {}", store_path.display());
    eprintln!(
        "Roles: manufacturer '{}', regulator '{}'; {} known credential(s)",
        config.roles.manufacturer,
        config.roles.regulator,
        config.identities.len()
    );

    let addr = format!("0.0.0.0:{}", port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        eprintln!("Custody ledger listening on https://0.0.0.0:{}", port);
        axum_server::bind_rustls(socket_addr, tls)
            .serve(app.into_make_service())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("Custody ledger listening on http://0.0.0.0:{}", port);
    tracing::info!(port, store = %store_path.display(), "server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    eprintln!("\nReceived shutdown signal...");
}
