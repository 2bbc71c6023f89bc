use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::InvariantViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub event_id: Uuid,
    pub status: OrderStatus,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub currency: String,
    pub total_base_amount: Decimal,
    pub total_tax_amount: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub unit_base_price: Decimal,
    pub unit_tax_amount: Decimal,
    pub unit_total: Decimal,
    pub line_base_total: Decimal,
    pub line_tax_total: Decimal,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.quantity <= 0 {
            return Err(InvariantViolation::NonPositiveQuantity(self.ticket_type_id));
        }
        let quantity = Decimal::from(self.quantity);
        let consistent = self.unit_total == self.unit_base_price + self.unit_tax_amount
            && self.line_base_total == self.unit_base_price * quantity
            && self.line_tax_total == self.unit_tax_amount * quantity
            && self.line_total == self.unit_total * quantity
            && self.line_total == self.line_base_total + self.line_tax_total;
        if !consistent {
            return Err(InvariantViolation::LineArithmetic(self.ticket_type_id));
        }
        Ok(())
    }
}

impl Order {
    /// Checks the order totals against its own items: base plus tax must
    /// equal the total, and every aggregate must equal the sum of its lines.
    pub fn validate_with_items(&self, items: &[OrderItem]) -> Result<(), InvariantViolation> {
        for item in items {
            item.validate()?;
        }
        let base: Decimal = items.iter().map(|i| i.line_base_total).sum();
        let tax: Decimal = items.iter().map(|i| i.line_tax_total).sum();
        let total: Decimal = items.iter().map(|i| i.line_total).sum();

        if self.total_amount != self.total_base_amount + self.total_tax_amount
            || self.total_base_amount != base
            || self.total_tax_amount != tax
            || self.total_amount != total
        {
            return Err(InvariantViolation::OrderTotals(self.id));
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::PendingPayment
    }
}
