//! Postgres-backed store.
//!
//! Check-in correctness rests on the conditional `UPDATE … WHERE
//! check_in_count = $2 AND status = 'active'`: under read committed, a
//! second writer blocks on the row lock, re-evaluates the predicate against
//! the committed row and matches nothing.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::{OrderStore, ScanLog, StoreResult, TicketStore};
use crate::models::{Event, Order, OrderItem, ScanLogEntry, Ticket, TicketType};

const TICKET_COLUMNS: &str = "id, order_id, ticket_type_id, unique_code, status, check_in_count, \
     max_entries, holder_name, holder_email, holder_phone, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, order_number, event_id, status, buyer_name, buyer_email, \
     buyer_phone, currency, total_base_amount, total_tax_amount, total_amount, created_at, \
     updated_at, paid_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, ticket_type_id, quantity, unit_base_price, \
     unit_tax_amount, unit_total, line_base_total, line_tax_total, line_total, created_at";

const SCAN_LOG_COLUMNS: &str = "id, ticket_id, scanner_id, scan_result, scan_source, scan_time";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

async fn insert_scan_entry<'e, E>(executor: E, entry: &ScanLogEntry) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(&format!(
        "INSERT INTO scan_logs ({SCAN_LOG_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
    ))
    .bind(entry.id)
    .bind(entry.ticket_id)
    .bind(entry.scanner_id)
    .bind(entry.scan_result)
    .bind(entry.scan_source)
    .bind(entry.scan_time)
    .execute(executor)
    .await?;
    Ok(())
}

fn validated(ticket: Ticket) -> StoreResult<Ticket> {
    ticket.validate()?;
    Ok(ticket)
}

#[async_trait]
impl TicketStore for PgStore {
    async fn find_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        ticket.map(validated).transpose()
    }

    async fn tickets_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        tickets.into_iter().map(validated).collect()
    }

    async fn commit_check_in(
        &self,
        ticket_id: Uuid,
        observed_count: i32,
        entry: &ScanLogEntry,
    ) -> StoreResult<Option<Ticket>> {
        let mut tx = self.pool.begin().await?;

        let advanced = sqlx::query_as::<_, Ticket>(&format!(
            r#"
            UPDATE tickets
            SET check_in_count = check_in_count + 1,
                status = CASE
                    WHEN check_in_count + 1 >= max_entries THEN 'used'::ticket_status
                    ELSE status
                END,
                updated_at = NOW()
            WHERE id = $1 AND check_in_count = $2 AND status = 'active'
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(ticket_id)
        .bind(observed_count)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(advanced) = advanced else {
            tx.rollback().await?;
            return Ok(None);
        };

        insert_scan_entry(&mut *tx, entry).await?;
        tx.commit().await?;

        validated(advanced).map(Some)
    }
}

#[async_trait]
impl ScanLog for PgStore {
    async fn append(&self, entry: &ScanLogEntry) -> StoreResult<()> {
        insert_scan_entry(&self.pool, entry).await?;
        Ok(())
    }

    async fn entries_for_ticket(&self, ticket_id: Uuid) -> StoreResult<Vec<ScanLogEntry>> {
        let entries = sqlx::query_as::<_, ScanLogEntry>(&format!(
            "SELECT {SCAN_LOG_COLUMNS} FROM scan_logs WHERE ticket_id = $1 ORDER BY scan_time, id"
        ))
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, name, venue, starts_at, currency, created_at, updated_at
             FROM events WHERE id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn ticket_types_for_event(&self, event_id: Uuid) -> StoreResult<Vec<TicketType>> {
        let ticket_types = sqlx::query_as::<_, TicketType>(
            "SELECT id, event_id, name, base_price, tax_rate, max_entries, max_per_order,
                    is_active, created_at, updated_at
             FROM ticket_types WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ticket_types)
    }

    async fn create_order(&self, order: &Order, items: &[OrderItem]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.event_id)
        .bind(order.status)
        .bind(&order.buyer_name)
        .bind(&order.buyer_email)
        .bind(&order.buyer_phone)
        .bind(&order.currency)
        .bind(order.total_base_amount)
        .bind(order.total_tax_amount)
        .bind(order.total_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.paid_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(&format!(
                "INSERT INTO order_items ({ORDER_ITEM_COLUMNS})
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
            ))
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.ticket_type_id)
            .bind(item.quantity)
            .bind(item.unit_base_price)
            .bind(item.unit_tax_amount)
            .bind(item.unit_total)
            .bind(item.line_base_total)
            .bind(item.line_tax_total)
            .bind(item.line_total)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn mark_paid_and_issue(
        &self,
        order_id: Uuid,
        tickets: &[Ticket],
    ) -> StoreResult<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        let paid = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders
             SET status = 'paid', paid_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status = 'pending_payment'
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(paid) = paid else {
            tx.rollback().await?;
            return Ok(None);
        };

        for ticket in tickets {
            sqlx::query(&format!(
                "INSERT INTO tickets ({TICKET_COLUMNS})
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
            ))
            .bind(ticket.id)
            .bind(ticket.order_id)
            .bind(ticket.ticket_type_id)
            .bind(&ticket.unique_code)
            .bind(ticket.status)
            .bind(ticket.check_in_count)
            .bind(ticket.max_entries)
            .bind(&ticket.holder_name)
            .bind(&ticket.holder_email)
            .bind(&ticket.holder_phone)
            .bind(ticket.created_at)
            .bind(ticket.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(paid))
    }
}
