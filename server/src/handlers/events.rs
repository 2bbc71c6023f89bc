use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Public event page: the event with the ticket types a buyer can order.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let catalog = state.orders.event_catalog(event_id).await?;
    Ok(success(catalog, "Event retrieved"))
}
