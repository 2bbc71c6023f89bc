use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub venue: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog entry a buyer can order. `tax_rate` is a percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub base_price: Decimal,
    pub tax_rate: Decimal,
    pub max_entries: i32,
    pub max_per_order: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, starts_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            venue: None,
            starts_at,
            currency: DEFAULT_CURRENCY.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl TicketType {
    pub fn new(event_id: Uuid, name: impl Into<String>, base_price: Decimal, tax_rate: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_id,
            name: name.into(),
            base_price,
            tax_rate,
            max_entries: 1,
            max_per_order: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_max_entries(mut self, max_entries: i32) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_max_per_order(mut self, max_per_order: i32) -> Self {
        self.max_per_order = Some(max_per_order);
        self
    }
}
