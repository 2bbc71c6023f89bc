pub mod event;
pub mod order;
pub mod scan_log;
pub mod ticket;

use thiserror::Error;
use uuid::Uuid;

pub use event::{Event, TicketType};
pub use order::{Order, OrderItem, OrderStatus};
pub use scan_log::{ScanLogEntry, ScanResult, ScanSource};
pub use ticket::{Ticket, TicketStatus};

/// A record whose fields contradict one of the entity invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("ticket {0} has a non-positive entry limit")]
    NonPositiveEntryLimit(Uuid),

    #[error("ticket {ticket_id} has check_in_count {count} outside 0..={max_entries}")]
    CheckInCountOutOfRange {
        ticket_id: Uuid,
        count: i32,
        max_entries: i32,
    },

    #[error("ticket {ticket_id} is used with only {count} of {max_entries} entries consumed")]
    UsedBeforeExhausted {
        ticket_id: Uuid,
        count: i32,
        max_entries: i32,
    },

    #[error("ticket {0} has an empty unique code")]
    EmptyUniqueCode(Uuid),

    #[error("order item for ticket type {0} has a non-positive quantity")]
    NonPositiveQuantity(Uuid),

    #[error("order item for ticket type {0} does not multiply out")]
    LineArithmetic(Uuid),

    #[error("order {0} totals do not match its items")]
    OrderTotals(Uuid),
}
