//! Persistence seams.
//!
//! The check-in path only ever mutates a ticket through
//! [`TicketStore::commit_check_in`], a compare-and-set on the observed
//! `check_in_count` that appends the `valid` scan entry in the same
//! transaction. Everything else is insert-only or read-only.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Event, InvariantViolation, Order, OrderItem, ScanLogEntry, Ticket, TicketType,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("stored record violates an invariant: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn find_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<Ticket>>;

    async fn tickets_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>>;

    /// Consumes one entry if, and only if, the ticket is still `active` with
    /// `check_in_count == observed_count`, and appends `entry` atomically
    /// with that change. Returns `None` when the precondition no longer holds.
    async fn commit_check_in(
        &self,
        ticket_id: Uuid,
        observed_count: i32,
        entry: &ScanLogEntry,
    ) -> StoreResult<Option<Ticket>>;
}

#[async_trait]
pub trait ScanLog: Send + Sync {
    async fn append(&self, entry: &ScanLogEntry) -> StoreResult<()>;

    /// Entries for one ticket, oldest first.
    async fn entries_for_ticket(&self, ticket_id: Uuid) -> StoreResult<Vec<ScanLogEntry>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>>;

    async fn ticket_types_for_event(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>>;

    /// Inserts the order and all its items as one commit.
    async fn create_order(&self, order: &Order, items: &[OrderItem]) -> StoreResult<()>;

    async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;

    async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>>;

    /// Moves a `pending_payment` order to `paid` and inserts its tickets in
    /// one commit. Returns `None`, with nothing written, if the order was not
    /// pending.
    async fn mark_paid_and_issue(
        &self,
        order_id: Uuid,
        tickets: &[Ticket],
    ) -> StoreResult<Option<Order>>;
}
