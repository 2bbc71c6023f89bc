//! Ticket issuance on payment confirmation.
//!
//! One ticket per purchased unit, each with a fresh random `unique_code`.
//! The order's move to `paid` and the ticket inserts commit together, so a
//! confirmation can never issue twice.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::token::{TicketClaims, TokenCodec, TokenError};
use crate::models::ticket::Holder;
use crate::models::{InvariantViolation, Order, Ticket};
use crate::store::{OrderStore, StoreError, TicketStore};

const UNIQUE_CODE_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct IssuedTicket {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("order {0} is not awaiting payment")]
    AlreadyPaid(Uuid),

    #[error("order item references unknown ticket type {0}")]
    UnknownTicketType(Uuid),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct IssuanceService {
    orders: Arc<dyn OrderStore>,
    tickets: Arc<dyn TicketStore>,
    codec: TokenCodec,
}

impl IssuanceService {
    pub fn new(orders: Arc<dyn OrderStore>, tickets: Arc<dyn TicketStore>, codec: TokenCodec) -> Self {
        Self {
            orders,
            tickets,
            codec,
        }
    }

    pub async fn confirm_payment(&self, order_id: Uuid) -> Result<Vec<IssuedTicket>, IssuanceError> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or(IssuanceError::OrderNotFound(order_id))?;
        if !order.is_pending() {
            return Err(IssuanceError::AlreadyPaid(order_id));
        }

        let items = self.orders.order_items(order_id).await?;
        let entry_limits: HashMap<Uuid, i32> = self
            .orders
            .ticket_types_for_event(order.event_id)
            .await?
            .into_iter()
            .map(|t| (t.id, t.max_entries))
            .collect();

        let holder = holder_from_buyer(&order);
        let mut tickets = Vec::new();
        for item in &items {
            let max_entries = *entry_limits
                .get(&item.ticket_type_id)
                .ok_or(IssuanceError::UnknownTicketType(item.ticket_type_id))?;
            for _ in 0..item.quantity {
                tickets.push(Ticket::issue(
                    order_id,
                    item.ticket_type_id,
                    unique_code(),
                    max_entries,
                    holder.clone(),
                )?);
            }
        }

        if self
            .orders
            .mark_paid_and_issue(order_id, &tickets)
            .await?
            .is_none()
        {
            return Err(IssuanceError::AlreadyPaid(order_id));
        }

        info!(%order_id, tickets = tickets.len(), "Payment confirmed, tickets issued");
        self.with_tokens(tickets)
    }

    pub async fn tickets_for_order(&self, order_id: Uuid) -> Result<Vec<IssuedTicket>, IssuanceError> {
        if self.orders.find_order(order_id).await?.is_none() {
            return Err(IssuanceError::OrderNotFound(order_id));
        }
        let tickets = self.tickets.tickets_for_order(order_id).await?;
        self.with_tokens(tickets)
    }

    fn with_tokens(&self, tickets: Vec<Ticket>) -> Result<Vec<IssuedTicket>, IssuanceError> {
        tickets
            .into_iter()
            .map(|ticket| {
                let token = self
                    .codec
                    .encode(&TicketClaims::new(ticket.id, ticket.unique_code.clone()))?;
                Ok(IssuedTicket { ticket, token })
            })
            .collect()
    }
}

fn holder_from_buyer(order: &Order) -> Holder {
    Holder {
        name: Some(order.buyer_name.clone()),
        email: Some(order.buyer_email.clone()),
        phone: order.buyer_phone.clone(),
    }
}

fn unique_code() -> String {
    let mut bytes = [0u8; UNIQUE_CODE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
