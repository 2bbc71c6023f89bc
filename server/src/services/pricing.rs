//! Order pricing.
//!
//! Turns a buyer's requested items and the event's ticket catalog into
//! per-line and aggregate amounts. All arithmetic is exact decimal
//! arithmetic: nothing is rounded, so the aggregate totals always equal the
//! sum of the lines and the payment step can charge `total` as computed.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::TicketType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub ticket_type_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub unit_base_price: Decimal,
    pub unit_tax_amount: Decimal,
    pub unit_total: Decimal,
    pub line_base_total: Decimal,
    pub line_tax_total: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub base: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedOrder {
    pub totals: OrderTotals,
    pub lines: Vec<PricedLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("order has no items")]
    EmptyOrder,

    #[error("unknown ticket type {0}")]
    UnknownTicketType(Uuid),

    #[error("invalid quantity {quantity} for ticket type {ticket_type_id}")]
    InvalidQuantity { ticket_type_id: Uuid, quantity: i64 },

    #[error("at most {limit} tickets of type {ticket_type_id} per order, requested {requested}")]
    QuantityLimitExceeded {
        ticket_type_id: Uuid,
        limit: i32,
        requested: i64,
    },

    #[error("order amount overflow")]
    AmountOverflow,
}

/// Ceiling on tickets in a single order. Applies even to ticket types with
/// no `max_per_order` of their own.
pub const MAX_TICKETS_PER_ORDER: i32 = 50;

/// Prices an order. Fails on the first bad item; no partial result is
/// ever returned.
pub fn compute_order(
    requested: &[RequestedItem],
    catalog: &[TicketType],
) -> Result<PricedOrder, PricingError> {
    if requested.is_empty() {
        return Err(PricingError::EmptyOrder);
    }

    let by_id: HashMap<Uuid, &TicketType> = catalog
        .iter()
        .filter(|t| t.is_active)
        .map(|t| (t.id, t))
        .collect();

    let mut requested_per_type: HashMap<Uuid, i64> = HashMap::new();
    let mut requested_in_order: i64 = 0;
    let mut lines = Vec::with_capacity(requested.len());
    let mut totals = OrderTotals::default();

    for item in requested {
        let ticket_type = by_id
            .get(&item.ticket_type_id)
            .copied()
            .ok_or(PricingError::UnknownTicketType(item.ticket_type_id))?;

        let quantity = i32::try_from(item.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(PricingError::InvalidQuantity {
                ticket_type_id: item.ticket_type_id,
                quantity: item.quantity,
            })?;

        let requested_so_far = requested_per_type.entry(ticket_type.id).or_insert(0);
        *requested_so_far += item.quantity;
        if let Some(limit) = ticket_type.max_per_order {
            if *requested_so_far > i64::from(limit) {
                return Err(PricingError::QuantityLimitExceeded {
                    ticket_type_id: ticket_type.id,
                    limit,
                    requested: *requested_so_far,
                });
            }
        }

        requested_in_order += item.quantity;
        if requested_in_order > i64::from(MAX_TICKETS_PER_ORDER) {
            return Err(PricingError::QuantityLimitExceeded {
                ticket_type_id: ticket_type.id,
                limit: MAX_TICKETS_PER_ORDER,
                requested: requested_in_order,
            });
        }

        let line = price_line(ticket_type, quantity)?;
        totals.base = checked_add(totals.base, line.line_base_total)?;
        totals.tax = checked_add(totals.tax, line.line_tax_total)?;
        totals.total = checked_add(totals.total, line.line_total)?;
        lines.push(line);
    }

    Ok(PricedOrder { totals, lines })
}

fn price_line(ticket_type: &TicketType, quantity: i32) -> Result<PricedLine, PricingError> {
    let unit_base_price = ticket_type.base_price;
    let unit_tax_amount = unit_base_price
        .checked_mul(ticket_type.tax_rate)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(PricingError::AmountOverflow)?;
    let unit_total = checked_add(unit_base_price, unit_tax_amount)?;

    let qty = Decimal::from(quantity);
    Ok(PricedLine {
        ticket_type_id: ticket_type.id,
        quantity,
        unit_base_price,
        unit_tax_amount,
        unit_total,
        line_base_total: checked_mul(unit_base_price, qty)?,
        line_tax_total: checked_mul(unit_tax_amount, qty)?,
        line_total: checked_mul(unit_total, qty)?,
    })
}

fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, PricingError> {
    a.checked_add(b).ok_or(PricingError::AmountOverflow)
}

fn checked_mul(a: Decimal, b: Decimal) -> Result<Decimal, PricingError> {
    a.checked_mul(b).ok_or(PricingError::AmountOverflow)
}
