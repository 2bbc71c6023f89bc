use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::services::issuance::IssuanceError;
use crate::services::orders::OrderError;
use crate::services::pricing::PricingError;
use crate::services::scanner_auth::ScannerAuthError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error")]
    StoreError(#[from] StoreError),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::Pricing(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StoreError(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::Pricing(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::StoreError(StoreError::Unavailable(_)) => "SERVICE_UNAVAILABLE",
            AppError::StoreError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::Pricing(e) => {
                error!(error = ?e, "Pricing error");
            }
            AppError::StoreError(e) => {
                error!(error = ?e, "Store error");
            }
        }
    }

    /// Machine-readable detail for pricing failures so checkout UIs can point
    /// at the offending line.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Pricing(PricingError::UnknownTicketType(id)) => {
                Some(json!({ "reason": "unknown_ticket_type", "ticket_type_id": id }))
            }
            AppError::Pricing(PricingError::InvalidQuantity {
                ticket_type_id,
                quantity,
            }) => Some(json!({
                "reason": "invalid_quantity",
                "ticket_type_id": ticket_type_id,
                "quantity": quantity,
            })),
            AppError::Pricing(PricingError::QuantityLimitExceeded {
                ticket_type_id,
                limit,
                ..
            }) => Some(json!({
                "reason": "quantity_limit_exceeded",
                "ticket_type_id": ticket_type_id,
                "limit": limit,
            })),
            _ => None,
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EventNotFound(_) | OrderError::OrderNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            OrderError::InvalidBuyer(_) => AppError::ValidationError(err.to_string()),
            OrderError::Pricing(e) => AppError::Pricing(e),
            OrderError::Invariant(e) => AppError::InternalServerError(e.to_string()),
            OrderError::Store(e) => AppError::StoreError(e),
        }
    }
}

impl From<IssuanceError> for AppError {
    fn from(err: IssuanceError) -> Self {
        match err {
            IssuanceError::OrderNotFound(_) => AppError::NotFound(err.to_string()),
            IssuanceError::AlreadyPaid(_) => AppError::Conflict(err.to_string()),
            IssuanceError::Store(e) => AppError::StoreError(e),
            IssuanceError::UnknownTicketType(_)
            | IssuanceError::Invariant(_)
            | IssuanceError::Token(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<ScannerAuthError> for AppError {
    fn from(err: ScannerAuthError) -> Self {
        AppError::AuthError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::Pricing(e) => e.to_string(),
            AppError::StoreError(StoreError::Unavailable(_)) => {
                "Service temporarily unavailable".to_string()
            }
            AppError::StoreError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "Internal server error".to_string(),
        };

        let details = self.details();

        error_response(status, code, public_message, details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::from(PricingError::EmptyOrder).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(IssuanceError::AlreadyPaid(Uuid::new_v4())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(StoreError::Unavailable("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(OrderError::EventNotFound(Uuid::new_v4())).code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn test_pricing_details_name_the_ticket_type() {
        let id = Uuid::new_v4();
        let details = AppError::from(PricingError::UnknownTicketType(id))
            .details()
            .unwrap();
        assert_eq!(details["reason"], "unknown_ticket_type");
        assert_eq!(details["ticket_type_id"], id.to_string());
    }
}
