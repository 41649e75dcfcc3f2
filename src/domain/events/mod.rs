//! Domain events
//!
//! Raised by aggregates and services, published to NATS when a connection
//! is configured. Publishing is best-effort; a failed publish never fails
//! the operation that raised the event.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::{OrderStatus, TicketStatus};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Catalog(CatalogEvent),
    Customer(CustomerEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: String, user_id: String, total: Decimal },
    StatusChanged { order_id: String, from: OrderStatus, to: OrderStatus },
    StockReserved { product_id: String, quantity: u32, remaining: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CatalogEvent {
    ProductSaved { product_id: String },
    ProductDeleted { product_id: String },
    ReviewSubmitted { review_id: String, product_id: String },
    ReviewModerated { review_id: String, approved: bool },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CustomerEvent {
    SignedUp { user_id: String },
    TicketOpened { ticket_id: String, user_id: String },
    TicketStatusChanged { ticket_id: String, status: TicketStatus },
}

impl DomainEvent {
    /// NATS subject, e.g. `storefront.order.placed`.
    pub fn subject(&self) -> String {
        let name = match self {
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "order.status_changed",
            Self::Order(OrderEvent::StockReserved { .. }) => "order.stock_reserved",
            Self::Catalog(CatalogEvent::ProductSaved { .. }) => "catalog.product_saved",
            Self::Catalog(CatalogEvent::ProductDeleted { .. }) => "catalog.product_deleted",
            Self::Catalog(CatalogEvent::ReviewSubmitted { .. }) => "catalog.review_submitted",
            Self::Catalog(CatalogEvent::ReviewModerated { .. }) => "catalog.review_moderated",
            Self::Customer(CustomerEvent::SignedUp { .. }) => "customer.signed_up",
            Self::Customer(CustomerEvent::TicketOpened { .. }) => "customer.ticket_opened",
            Self::Customer(CustomerEvent::TicketStatusChanged { .. }) => "customer.ticket_status_changed",
        };
        format!("storefront.{name}")
    }
}

/// Fan-out for domain events.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// Publisher that only logs.
    pub fn disabled() -> Self { Self::default() }

    pub async fn publish(&self, event: DomainEvent) {
        let subject = event.subject();
        tracing::debug!(%subject, ?event, "domain event");
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(%subject, error = %err, "failed to encode event");
                return;
            }
        };
        if let Err(err) = client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(%subject, error = %err, "failed to publish event");
        }
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in events { self.publish(event).await; }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects_and_payload_shape() {
        let e = DomainEvent::Order(OrderEvent::Placed { order_id: "O1".into(), user_id: "U1".into(), total: Decimal::new(9_000, 0) });
        assert_eq!(e.subject(), "storefront.order.placed");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "order");
        assert_eq!(json["event"], "placed");
        assert_eq!(json["order_id"], "O1");
    }

    #[tokio::test]
    async fn test_disabled_publisher_is_noop() {
        EventPublisher::disabled()
            .publish(DomainEvent::Customer(CustomerEvent::SignedUp { user_id: "U1".into() }))
            .await;
    }
}
