//! Shared server state and the caller credential extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use custody_core::ErrorKind;
use custody_ledger::CustodyLedger;
use custody_storage::CustodyStorage;

use super::json_error;

/// Request header carrying the caller's credential.
pub(crate) const CREDENTIAL_HEADER: &str = "x-caller-credential";

/// Application state shared across request handlers.
pub(crate) struct AppState<S: CustodyStorage> {
    pub(crate) ledger: CustodyLedger<S>,
}

/// The authenticated caller of a mutating request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CallerCredential(pub(crate) String);

impl<T: Send + Sync> FromRequestParts<T> for CallerCredential {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &T) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(CREDENTIAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        match credential {
            Some(c) => Ok(CallerCredential(c.to_string())),
            None => Err(json_error(
                StatusCode::UNAUTHORIZED,
                ErrorKind::IdentityUnavailable.as_str(),
                "missing X-Caller-Credential header",
            )
            .into_response()),
        }
    }
}
