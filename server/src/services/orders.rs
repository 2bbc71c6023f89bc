//! Order creation: validate the buyer, price the requested items against the
//! event's catalog, and persist the order with its items in one commit.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::pricing::{compute_order, PricedLine, PricingError, RequestedItem};
use crate::models::{Event, InvariantViolation, Order, OrderItem, OrderStatus, TicketType};
use crate::store::{OrderStore, StoreError};

#[derive(Debug, Clone, Deserialize)]
pub struct BuyerInfo {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<RequestedItem>,
    pub buyer: BuyerInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub payable_amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// What a checkout client needs to build an order: the event and the
/// ticket types currently on sale.
#[derive(Debug, Clone, Serialize)]
pub struct EventCatalog {
    pub event: Event,
    pub ticket_types: Vec<TicketType>,
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("event {0} not found")]
    EventNotFound(Uuid),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("invalid buyer: {0}")]
    InvalidBuyer(&'static str),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct OrderService {
    store: Arc<dyn OrderStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn create_order(
        &self,
        event_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<CreatedOrder, OrderError> {
        let buyer = validate_buyer(request.buyer)?;

        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or(OrderError::EventNotFound(event_id))?;
        let catalog = self.store.ticket_types_for_event(event_id).await?;
        let priced = compute_order(&request.items, &catalog)?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            order_number: order_number(),
            event_id,
            status: OrderStatus::PendingPayment,
            buyer_name: buyer.name,
            buyer_email: buyer.email,
            buyer_phone: buyer.phone,
            currency: event.currency,
            total_base_amount: priced.totals.base,
            total_tax_amount: priced.totals.tax,
            total_amount: priced.totals.total,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        let items: Vec<OrderItem> = priced
            .lines
            .iter()
            .map(|line| order_item(order.id, line))
            .collect();
        order.validate_with_items(&items)?;

        self.store.create_order(&order, &items).await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            %event_id,
            total = %order.total_amount,
            "Order created"
        );

        Ok(CreatedOrder {
            order_id: order.id,
            order_number: order.order_number,
            payable_amount: order.total_amount,
            currency: order.currency,
        })
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, OrderError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let items = self.store.order_items(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    pub async fn event_catalog(&self, event_id: Uuid) -> Result<EventCatalog, OrderError> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or(OrderError::EventNotFound(event_id))?;
        let mut ticket_types: Vec<TicketType> = self
            .store
            .ticket_types_for_event(event_id)
            .await?
            .into_iter()
            .filter(|t| t.is_active)
            .collect();
        ticket_types.sort_by(|a, b| a.base_price.cmp(&b.base_price).then(a.name.cmp(&b.name)));
        Ok(EventCatalog {
            event,
            ticket_types,
        })
    }
}

fn validate_buyer(buyer: BuyerInfo) -> Result<BuyerInfo, OrderError> {
    let name = buyer.name.trim().to_string();
    let email = buyer.email.trim().to_string();
    if name.is_empty() {
        return Err(OrderError::InvalidBuyer("name is required"));
    }
    if !email.contains('@') {
        return Err(OrderError::InvalidBuyer("a valid email is required"));
    }
    let phone = buyer
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    Ok(BuyerInfo { name, email, phone })
}

/// `ORD-` followed by eight upper-case hex characters.
fn order_number() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", id[..8].to_uppercase())
}

fn order_item(order_id: Uuid, line: &PricedLine) -> OrderItem {
    OrderItem {
        id: Uuid::new_v4(),
        order_id,
        ticket_type_id: line.ticket_type_id,
        quantity: line.quantity,
        unit_base_price: line.unit_base_price,
        unit_tax_amount: line.unit_tax_amount,
        unit_total: line.unit_total,
        line_base_total: line.line_base_total,
        line_tax_total: line.line_tax_total,
        line_total: line.line_total,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pricing::MAX_TICKETS_PER_ORDER;
    use crate::store::MemoryStore;

    fn buyer() -> BuyerInfo {
        BuyerInfo {
            name: "Ravi Kumar".to_string(),
            email: "ravi@example.com".to_string(),
            phone: Some("  ".to_string()),
        }
    }

    fn seeded() -> (MemoryStore, OrderService, Event, TicketType) {
        let store = MemoryStore::new();
        let event = Event::new("Launch Night", Utc::now());
        let ticket_type =
            TicketType::new(event.id, "General", Decimal::from(500), Decimal::from(18));
        store.insert_event(event.clone());
        store.insert_ticket_type(ticket_type.clone());
        let service = OrderService::new(Arc::new(store.clone()));
        (store, service, event, ticket_type)
    }

    #[tokio::test]
    async fn test_create_order_persists_priced_items() {
        let (_store, service, event, tt) = seeded();
        let created = service
            .create_order(
                event.id,
                CreateOrderRequest {
                    items: vec![RequestedItem {
                        ticket_type_id: tt.id,
                        quantity: 2,
                    }],
                    buyer: buyer(),
                },
            )
            .await
            .unwrap();

        assert_eq!(created.payable_amount, Decimal::from(1180));
        assert_eq!(created.currency, "INR");
        assert!(created.order_number.starts_with("ORD-"));
        assert_eq!(created.order_number.len(), 12);

        let details = service.get_order(created.order_id).await.unwrap();
        assert_eq!(details.order.status, OrderStatus::PendingPayment);
        assert_eq!(details.order.buyer_phone, None);
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].line_tax_total, Decimal::from(180));
        let line_sum: Decimal = details.items.iter().map(|i| i.line_total).sum();
        assert_eq!(line_sum, details.order.total_amount);
    }

    #[tokio::test]
    async fn test_unknown_type_creates_nothing() {
        let (_store, service, event, tt) = seeded();
        let bogus = Uuid::new_v4();
        let err = service
            .create_order(
                event.id,
                CreateOrderRequest {
                    items: vec![
                        RequestedItem {
                            ticket_type_id: tt.id,
                            quantity: 1,
                        },
                        RequestedItem {
                            ticket_type_id: bogus,
                            quantity: 1,
                        },
                    ],
                    buyer: buyer(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::Pricing(PricingError::UnknownTicketType(id)) if id == bogus
        ));
    }

    #[tokio::test]
    async fn test_ticket_type_from_other_event_is_unknown() {
        let (store, service, event, _) = seeded();
        let other = Event::new("Other", Utc::now());
        let foreign = TicketType::new(other.id, "VIP", Decimal::from(900), Decimal::from(18));
        store.insert_event(other);
        store.insert_ticket_type(foreign.clone());

        let err = service
            .create_order(
                event.id,
                CreateOrderRequest {
                    items: vec![RequestedItem {
                        ticket_type_id: foreign.id,
                        quantity: 1,
                    }],
                    buyer: buyer(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Pricing(PricingError::UnknownTicketType(_))));
    }

    #[tokio::test]
    async fn test_missing_event_and_bad_buyer() {
        let (_store, service, event, tt) = seeded();
        let items = vec![RequestedItem {
            ticket_type_id: tt.id,
            quantity: 1,
        }];

        let missing = Uuid::new_v4();
        let err = service
            .create_order(
                missing,
                CreateOrderRequest {
                    items: items.clone(),
                    buyer: buyer(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::EventNotFound(id) if id == missing));

        let mut bad = buyer();
        bad.email = "nope".to_string();
        let err = service
            .create_order(event.id, CreateOrderRequest { items, buyer: bad })
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidBuyer(_)));
    }

    #[tokio::test]
    async fn test_get_unknown_order() {
        let (_store, service, _, _) = seeded();
        assert!(matches!(
            service.get_order(Uuid::new_v4()).await,
            Err(OrderError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_order_is_refused() {
        let (_store, service, event, tt) = seeded();
        assert_eq!(tt.max_per_order, None);

        let err = service
            .create_order(
                event.id,
                CreateOrderRequest {
                    items: vec![RequestedItem {
                        ticket_type_id: tt.id,
                        quantity: i64::from(i32::MAX),
                    }],
                    buyer: buyer(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::Pricing(PricingError::QuantityLimitExceeded { limit, .. })
                if limit == MAX_TICKETS_PER_ORDER
        ));
    }

    #[tokio::test]
    async fn test_event_catalog_lists_only_active_types() {
        let (store, service, event, general) = seeded();
        let mut retired =
            TicketType::new(event.id, "Early Bird", Decimal::from(300), Decimal::from(18));
        retired.is_active = false;
        let vip = TicketType::new(event.id, "VIP", Decimal::from(2500), Decimal::from(28));
        store.insert_ticket_type(retired);
        store.insert_ticket_type(vip.clone());

        let catalog = service.event_catalog(event.id).await.unwrap();
        assert_eq!(catalog.event.id, event.id);
        let ids: Vec<Uuid> = catalog.ticket_types.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![general.id, vip.id]);

        let missing = Uuid::new_v4();
        let err = service.event_catalog(missing).await.unwrap_err();
        assert!(matches!(err, OrderError::EventNotFound(id) if id == missing));
    }
}
