//! In-process store with the same atomicity as [`super::PgStore`]: every
//! operation runs under one mutex, so a compare-and-set observes and
//! writes in a single critical section.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{OrderStore, ScanLog, StoreError, StoreResult, TicketStore};
use crate::models::{
    Event, Order, OrderItem, OrderStatus, ScanLogEntry, Ticket, TicketStatus, TicketType,
};

#[derive(Debug, Default)]
struct State {
    events: HashMap<Uuid, Event>,
    ticket_types: HashMap<Uuid, TicketType>,
    orders: HashMap<Uuid, Order>,
    order_items: Vec<OrderItem>,
    tickets: HashMap<Uuid, Ticket>,
    scan_log: Vec<ScanLogEntry>,
    unavailable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_event(&self, event: Event) {
        self.lock_unchecked().events.insert(event.id, event);
    }

    pub fn insert_ticket_type(&self, ticket_type: TicketType) {
        self.lock_unchecked()
            .ticket_types
            .insert(ticket_type.id, ticket_type);
    }

    /// Seeds a ticket directly, bypassing issuance.
    pub fn insert_ticket(&self, ticket: Ticket) {
        self.lock_unchecked().tickets.insert(ticket.id, ticket);
    }

    /// Overwrites a ticket's status, the way a refund or cancellation
    /// collaborator would.
    pub fn set_ticket_status(&self, ticket_id: Uuid, status: TicketStatus) {
        if let Some(ticket) = self.lock_unchecked().tickets.get_mut(&ticket_id) {
            ticket.status = status;
            ticket.updated_at = Utc::now();
        }
    }

    pub fn ticket(&self, ticket_id: Uuid) -> Option<Ticket> {
        self.lock_unchecked().tickets.get(&ticket_id).cloned()
    }

    pub fn scan_log(&self) -> Vec<ScanLogEntry> {
        self.lock_unchecked().scan_log.clone()
    }

    /// While set, every trait operation fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock_unchecked().unavailable = unavailable;
    }

    fn lock_unchecked(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        let guard = self.lock_unchecked();
        if guard.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(guard)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn find_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.lock()?.tickets.get(&ticket_id).cloned())
    }

    async fn tickets_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let state = self.lock()?;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (t.created_at, t.id));
        Ok(tickets)
    }

    async fn commit_check_in(
        &self,
        ticket_id: Uuid,
        observed_count: i32,
        entry: &ScanLogEntry,
    ) -> StoreResult<Option<Ticket>> {
        let mut state = self.lock()?;
        let Some(current) = state.tickets.get(&ticket_id) else {
            return Ok(None);
        };
        if current.status.is_terminal() || current.check_in_count != observed_count {
            return Ok(None);
        }

        let advanced = current.advanced(Utc::now());
        advanced.validate()?;
        state.tickets.insert(ticket_id, advanced.clone());
        state.scan_log.push(entry.clone());
        Ok(Some(advanced))
    }
}

#[async_trait]
impl ScanLog for MemoryStore {
    async fn append(&self, entry: &ScanLogEntry) -> StoreResult<()> {
        self.lock()?.scan_log.push(entry.clone());
        Ok(())
    }

    async fn entries_for_ticket(&self, ticket_id: Uuid) -> StoreResult<Vec<ScanLogEntry>> {
        Ok(self
            .lock()?
            .scan_log
            .iter()
            .filter(|e| e.ticket_id == Some(ticket_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.lock()?.events.get(&event_id).cloned())
    }

    async fn ticket_types_for_event(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>> {
        Ok(self
            .lock()?
            .ticket_types
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn create_order(&self, order: &Order, items: &[OrderItem]) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.orders.insert(order.id, order.clone());
        state.order_items.extend(items.iter().cloned());
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.lock()?.orders.get(&order_id).cloned())
    }

    async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
        Ok(self
            .lock()?
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn mark_paid_and_issue(
        &self,
        order_id: Uuid,
        tickets: &[Ticket],
    ) -> StoreResult<Option<Order>> {
        let mut state = self.lock()?;
        let Some(order) = state.orders.get_mut(&order_id) else {
            return Ok(None);
        };
        if order.status != OrderStatus::PendingPayment {
            return Ok(None);
        }

        let now = Utc::now();
        order.status = OrderStatus::Paid;
        order.paid_at = Some(now);
        order.updated_at = now;
        let paid = order.clone();

        for ticket in tickets {
            state.tickets.insert(ticket.id, ticket.clone());
        }
        Ok(Some(paid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ticket::Holder;
    use crate::models::{ScanResult, ScanSource};

    fn seeded(max_entries: i32) -> (MemoryStore, Ticket) {
        let store = MemoryStore::new();
        let ticket = Ticket::issue(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "code".to_string(),
            max_entries,
            Holder::default(),
        )
        .unwrap();
        store.insert_ticket(ticket.clone());
        (store, ticket)
    }

    fn valid_entry(ticket: &Ticket) -> ScanLogEntry {
        ScanLogEntry::record(
            Some(ticket.id),
            Uuid::new_v4(),
            ScanResult::Valid,
            ScanSource::Camera,
        )
    }

    #[tokio::test]
    async fn test_commit_check_in_applies_once_per_observed_count() {
        let (store, ticket) = seeded(2);
        let entry = valid_entry(&ticket);

        let first = store.commit_check_in(ticket.id, 0, &entry).await.unwrap();
        assert_eq!(first.unwrap().check_in_count, 1);

        let stale = store.commit_check_in(ticket.id, 0, &entry).await.unwrap();
        assert!(stale.is_none());
        assert_eq!(store.scan_log().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_check_in_refuses_terminal_ticket() {
        let (store, ticket) = seeded(3);
        store.set_ticket_status(ticket.id, TicketStatus::Cancelled);

        let result = store
            .commit_check_in(ticket.id, 0, &valid_entry(&ticket))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.scan_log().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let (store, ticket) = seeded(1);
        store.set_unavailable(true);
        assert!(matches!(
            store.find_ticket(ticket.id).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.find_ticket(ticket.id).await.unwrap().is_some());
    }
}
