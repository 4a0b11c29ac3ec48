//! Route handlers for the batch API.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use custody_core::{ErrorKind, NewBatch};
use custody_ledger::{BatchFilter, LedgerError};
use custody_storage::CustodyStorage;

use super::json_error;
use super::state::{AppState, CallerCredential};

type SharedState<S> = State<Arc<AppState<S>>>;

/// HTTP status for each ledger error kind.
pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::IdentityUnavailable => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists | ErrorKind::InvalidState | ErrorKind::Conflict => {
            StatusCode::CONFLICT
        }
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn ledger_error(e: LedgerError) -> Response {
    let kind = e.kind();
    json_error(status_for(kind), kind.as_str(), &e.to_string()).into_response()
}

fn bad_request(message: String) -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        ErrorKind::InvalidArgument.as_str(),
        &message,
    )
    .into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransferRequest {
    to: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecallRequest {
    reason: String,
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, ErrorKind::NotFound.as_str(), "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// GET /batches
pub(crate) async fn handle_list_batches<S: CustodyStorage>(
    State(state): SharedState<S>,
    filter: Result<Query<BatchFilter>, QueryRejection>,
) -> Response {
    let Query(filter) = match filter {
        Ok(f) => f,
        Err(e) => return bad_request(e.body_text()),
    };
    match state.ledger.list(&filter).await {
        Ok(records) => (StatusCode::OK, Json(serde_json::json!({ "batches": records })))
            .into_response(),
        Err(e) => ledger_error(e),
    }
}

/// GET /batches/{id}
///
/// Responds with the stored document exactly as persisted.
pub(crate) async fn handle_track<S: CustodyStorage>(
    State(state): SharedState<S>,
    Path(id): Path<String>,
) -> Response {
    match state.ledger.track_document(&id).await {
        Ok(document) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            document,
        )
            .into_response(),
        Err(e) => ledger_error(e),
    }
}

/// POST /batches
pub(crate) async fn handle_register<S: CustodyStorage>(
    State(state): SharedState<S>,
    CallerCredential(credential): CallerCredential,
    body: Result<Json<NewBatch>, JsonRejection>,
) -> Response {
    let Json(batch) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e.body_text()),
    };
    match state.ledger.register_batch(&credential, batch).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => ledger_error(e),
    }
}

/// POST /batches/{id}/transfer
pub(crate) async fn handle_transfer<S: CustodyStorage>(
    State(state): SharedState<S>,
    CallerCredential(credential): CallerCredential,
    Path(id): Path<String>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e.body_text()),
    };
    match state
        .ledger
        .transfer_custody(&credential, &id, &request.to)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => ledger_error(e),
    }
}

/// POST /batches/{id}/deliver
pub(crate) async fn handle_deliver<S: CustodyStorage>(
    State(state): SharedState<S>,
    CallerCredential(credential): CallerCredential,
    Path(id): Path<String>,
) -> Response {
    match state.ledger.mark_delivered(&credential, &id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => ledger_error(e),
    }
}

/// POST /batches/{id}/recall
pub(crate) async fn handle_recall<S: CustodyStorage>(
    State(state): SharedState<S>,
    CallerCredential(credential): CallerCredential,
    Path(id): Path<String>,
    body: Result<Json<RecallRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e.body_text()),
    };
    match state.ledger.recall(&credential, &id, &request.reason).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => ledger_error(e),
    }
}
