//! Gate-side endpoints. Every route here requires a scanner credential in
//! `Authorization: Bearer <credential>`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;
use axum::{async_trait, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{ScanResult, ScanSource};
use crate::services::ScannerIdentity;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{success, with_status};

/// A request whose bearer credential verified against the scanner key.
#[derive(Debug, Clone)]
pub struct AuthenticatedScanner(pub ScannerIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedScanner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Missing authorization header".to_string()))?;

        let credential = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                AppError::AuthError("Expected 'Bearer <credential>'".to_string())
            })?;

        let identity = state.scanner_auth.verify(credential)?;
        Ok(Self(identity))
    }
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub token: String,
    #[serde(default)]
    pub source: ScanSource,
}

pub async fn scan(
    State(state): State<AppState>,
    AuthenticatedScanner(scanner): AuthenticatedScanner,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;

    let outcome = state
        .checkin
        .attempt_check_in(&request.token, &scanner, request.source)
        .await;

    let message = outcome
        .message
        .clone()
        .unwrap_or_else(|| "Scan processed".to_string());

    // Rejections are answers, not failures. Only an undecided scan is 503.
    let response = match outcome.result {
        ScanResult::Error => {
            with_status(StatusCode::SERVICE_UNAVAILABLE, false, outcome, message)
        }
        _ => success(outcome, message),
    };
    Ok(response)
}

pub async fn scan_history(
    State(state): State<AppState>,
    AuthenticatedScanner(_scanner): AuthenticatedScanner,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let entries = state.scan_log.entries_for_ticket(ticket_id).await?;
    Ok(success(entries, "Scan history retrieved"))
}
