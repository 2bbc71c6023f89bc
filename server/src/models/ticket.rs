use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::InvariantViolation;

/// Admission state of a ticket. Every state other than `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
    Refunded,
}

impl TicketStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TicketStatus::Active)
    }

    /// Cancelled and refunded tickets never admit, whatever their count says.
    pub fn is_voided(self) -> bool {
        matches!(self, TicketStatus::Cancelled | TicketStatus::Refunded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub ticket_type_id: Uuid,
    #[serde(skip_serializing)]
    pub unique_code: String,
    pub status: TicketStatus,
    pub check_in_count: i32,
    pub max_entries: i32,
    pub holder_name: Option<String>,
    pub holder_email: Option<String>,
    pub holder_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Descriptive holder metadata printed on the ticket and shown at the gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Ticket {
    /// Builds a freshly issued, unscanned ticket.
    pub fn issue(
        order_id: Uuid,
        ticket_type_id: Uuid,
        unique_code: String,
        max_entries: i32,
        holder: Holder,
    ) -> Result<Self, InvariantViolation> {
        let now = Utc::now();
        let ticket = Self {
            id: Uuid::new_v4(),
            order_id,
            ticket_type_id,
            unique_code,
            status: TicketStatus::Active,
            check_in_count: 0,
            max_entries,
            holder_name: holder.name,
            holder_email: holder.email,
            holder_phone: holder.phone,
            created_at: now,
            updated_at: now,
        };
        ticket.validate()?;
        Ok(ticket)
    }

    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.max_entries <= 0 {
            return Err(InvariantViolation::NonPositiveEntryLimit(self.id));
        }
        if self.check_in_count < 0 || self.check_in_count > self.max_entries {
            return Err(InvariantViolation::CheckInCountOutOfRange {
                ticket_id: self.id,
                count: self.check_in_count,
                max_entries: self.max_entries,
            });
        }
        if self.status == TicketStatus::Used && self.check_in_count < self.max_entries {
            return Err(InvariantViolation::UsedBeforeExhausted {
                ticket_id: self.id,
                count: self.check_in_count,
                max_entries: self.max_entries,
            });
        }
        if self.unique_code.is_empty() {
            return Err(InvariantViolation::EmptyUniqueCode(self.id));
        }
        Ok(())
    }

    pub fn is_exhausted(&self) -> bool {
        self.status == TicketStatus::Used || self.check_in_count >= self.max_entries
    }

    pub fn remaining_entries(&self) -> i32 {
        (self.max_entries - self.check_in_count).max(0)
    }

    /// State after consuming one entry: the count moves up by one and the
    /// ticket becomes `Used` once the limit is reached.
    pub fn advanced(&self, at: DateTime<Utc>) -> Ticket {
        let check_in_count = self.check_in_count + 1;
        let status = if check_in_count >= self.max_entries {
            TicketStatus::Used
        } else {
            self.status
        };
        Ticket {
            check_in_count,
            status,
            updated_at: at,
            ..self.clone()
        }
    }

    pub fn holder(&self) -> Holder {
        Holder {
            name: self.holder_name.clone(),
            email: self.holder_email.clone(),
            phone: self.holder_phone.clone(),
        }
    }
}
