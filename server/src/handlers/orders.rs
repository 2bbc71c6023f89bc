use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::response::Response;
use axum::{async_trait, Json};
use constant_time_eq::constant_time_eq;
use uuid::Uuid;

use crate::services::orders::CreateOrderRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub const PAYMENT_SECRET_HEADER: &str = "x-payment-confirmation-secret";

/// Gate for the payment callback. Open when no secret is configured.
pub struct PaymentCallback;

#[async_trait]
impl FromRequestParts<AppState> for PaymentCallback {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.payment_confirmation_secret.as_deref() else {
            return Ok(Self);
        };

        let presented = parts
            .headers
            .get(PAYMENT_SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError("Missing payment confirmation secret".to_string())
            })?;

        if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
            return Err(AppError::AuthError(
                "Invalid payment confirmation secret".to_string(),
            ));
        }
        Ok(Self)
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let order = state.orders.create_order(event_id, request).await?;
    Ok(created(order, "Order created"))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let details = state.orders.get_order(order_id).await?;
    Ok(success(details, "Order retrieved"))
}

/// Payment-provider callback. Issues the order's tickets exactly once.
pub async fn confirm_payment(
    State(state): State<AppState>,
    _callback: PaymentCallback,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let tickets = state.issuance.confirm_payment(order_id).await?;
    Ok(success(tickets, "Payment confirmed, tickets issued"))
}

pub async fn order_tickets(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let tickets = state.issuance.tickets_for_order(order_id).await?;
    Ok(success(tickets, "Tickets retrieved"))
}
