//! Order Lifecycle Manager: staff-driven status changes, archival and removal.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::retry_read;
use crate::domain::aggregates::{Order, OrderHistoryRecord, OrderStatus};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::OrderNumber;
use crate::error::{OrderingError, Result};
use crate::events::EventPublisher;
use crate::store::{OrderFilter, OrderRepository};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub order: Order,
    pub previous: OrderStatus,
    /// Set when the transition reached a terminal status and auto-archive is on.
    pub archived: bool,
}

#[derive(Clone)]
pub struct LifecycleService {
    orders: Arc<dyn OrderRepository>,
    events: EventPublisher,
    auto_archive: bool,
    read_retries: u32,
}

impl LifecycleService {
    pub fn new(orders: Arc<dyn OrderRepository>, events: EventPublisher, auto_archive: bool, read_retries: u32) -> Self {
        Self { orders, events, auto_archive, read_retries }
    }

    pub async fn get(&self, number: &OrderNumber) -> Result<Order> {
        retry_read(self.read_retries, || self.orders.find_order(number))
            .await?
            .ok_or_else(|| OrderingError::NotFound(format!("order {number}")))
    }

    pub async fn list_active(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        retry_read(self.read_retries, || self.orders.list_orders(filter)).await
    }

    pub async fn list_history(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<Vec<OrderHistoryRecord>> {
        retry_read(self.read_retries, || self.orders.list_history(from, to)).await
    }

    /// Applies one transition. The write only lands if nobody changed the status since it was read.
    pub async fn update_status(&self, number: &OrderNumber, next: OrderStatus) -> Result<StatusUpdate> {
        let mut order = self.get(number).await?;
        let previous = order.status();
        let event = order.transition_to(next)?;
        if !self.orders.update_order(&order, previous).await? {
            return Err(OrderingError::Conflict(format!("order {number} was modified concurrently")));
        }
        tracing::info!(order_number = %number, from = %previous, to = %next, "Order status changed");
        self.events.publish(&event).await;

        let archived = if self.auto_archive && next.is_terminal() {
            match self.archive(order.clone()).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(order_number = %number, error = %e, "Auto-archive failed, order stays active");
                    false
                }
            }
        } else {
            false
        };
        Ok(StatusUpdate { order, previous, archived })
    }

    pub async fn move_to_history(&self, number: &OrderNumber) -> Result<OrderHistoryRecord> {
        let order = self.get(number).await?;
        self.archive(order).await
    }

    /// Hard delete at any status. No history record is kept.
    pub async fn delete_order(&self, number: &OrderNumber, actor: &str) -> Result<()> {
        if !self.orders.delete_order(number).await? {
            return Err(OrderingError::NotFound(format!("order {number}")));
        }
        tracing::warn!(order_number = %number, actor, "Order deleted");
        self.events.publish(&OrderEvent::Deleted { order_number: number.to_string(), actor: actor.to_string() }).await;
        Ok(())
    }

    async fn archive(&self, order: Order) -> Result<OrderHistoryRecord> {
        let number = order.order_number().clone();
        let record = order.into_history().map_err(|(_, e)| e)?;
        if !self.orders.archive_order(&record).await? {
            return Err(OrderingError::Conflict(format!("order {number} changed before it could be archived")));
        }
        tracing::info!(order_number = %number, status = %record.order.status(), "Order archived");
        self.events
            .publish(&OrderEvent::Archived { order_number: number.to_string(), status: record.order.status() })
            .await;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Customer, NewOrder, OrderLine, PaymentMethod};
    use crate::domain::value_objects::PickupTime;
    use crate::store::MemoryStore;
    use chrono::FixedOffset;
    use rust_decimal::Decimal;

    async fn seeded(auto_archive: bool) -> (LifecycleService, Arc<MemoryStore>, OrderNumber) {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let order = Order::create(NewOrder {
            order_number: OrderNumber::generate(now),
            customer: Customer { identity_id: Some("u1".into()), ..Customer::default() },
            items: vec![OrderLine { food_id: None, name: "Gimbap".into(), unit_price: Decimal::new(4000, 0), quantity: 1, category: "snack".into(), image: None }],
            total_amount: Decimal::new(4200, 0),
            pickup_time: PickupTime::parse(&(now + chrono::Duration::minutes(30)).to_rfc3339(), now, FixedOffset::east_opt(0).unwrap()).unwrap(),
            payment_method: PaymentMethod::PayAtPickup,
            payment_session_id: None,
        })
        .unwrap();
        store.insert_order(&order).await.unwrap();
        let number = order.order_number().clone();
        (LifecycleService::new(store.clone(), EventPublisher::default(), auto_archive, 0), store, number)
    }

    #[tokio::test]
    async fn test_status_progression() {
        let (lifecycle, _, number) = seeded(false).await;
        let update = lifecycle.update_status(&number, OrderStatus::Confirmed).await.unwrap();
        assert_eq!(update.previous, OrderStatus::Pending);
        assert_eq!(lifecycle.get(&number).await.unwrap().status(), OrderStatus::Confirmed);

        let err = lifecycle.update_status(&number, OrderStatus::Pending).await.unwrap_err();
        assert!(matches!(err, OrderingError::InvalidTransition { from: OrderStatus::Confirmed, to: OrderStatus::Pending }));
        assert_eq!(lifecycle.get(&number).await.unwrap().status(), OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected() {
        let (lifecycle, store, number) = seeded(false).await;
        let mut stale = lifecycle.get(&number).await.unwrap();
        lifecycle.update_status(&number, OrderStatus::Preparing).await.unwrap();
        stale.transition_to(OrderStatus::Cancelled).unwrap();
        assert!(!store.update_order(&stale, OrderStatus::Pending).await.unwrap());
        assert_eq!(lifecycle.get(&number).await.unwrap().status(), OrderStatus::Preparing);
    }

    #[tokio::test]
    async fn test_archive_requires_terminal_status() {
        let (lifecycle, _, number) = seeded(false).await;
        assert!(matches!(lifecycle.move_to_history(&number).await, Err(OrderingError::InvalidStateForArchival { .. })));

        lifecycle.update_status(&number, OrderStatus::Completed).await.unwrap();
        let record = lifecycle.move_to_history(&number).await.unwrap();
        assert_eq!(record.order.status(), OrderStatus::Completed);
        assert!(matches!(lifecycle.get(&number).await, Err(OrderingError::NotFound(_))));
        assert_eq!(lifecycle.list_history(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_archive_on_terminal_status() {
        let (lifecycle, _, number) = seeded(true).await;
        let update = lifecycle.update_status(&number, OrderStatus::Ready).await.unwrap();
        assert!(!update.archived);
        let update = lifecycle.update_status(&number, OrderStatus::Cancelled).await.unwrap();
        assert!(update.archived);
        assert!(lifecycle.list_active(&OrderFilter::default()).await.unwrap().is_empty());
        assert_eq!(lifecycle.list_history(None, None).await.unwrap()[0].order.status(), OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_delete_leaves_no_history() {
        let (lifecycle, _, number) = seeded(false).await;
        lifecycle.delete_order(&number, "admin-1").await.unwrap();
        assert!(matches!(lifecycle.get(&number).await, Err(OrderingError::NotFound(_))));
        assert!(lifecycle.list_history(None, None).await.unwrap().is_empty());
        assert!(matches!(lifecycle.delete_order(&number, "admin-1").await, Err(OrderingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let (lifecycle, _, _) = seeded(false).await;
        let mine = OrderFilter { identity_id: Some("u1".into()), ..OrderFilter::default() };
        let theirs = OrderFilter { identity_id: Some("u2".into()), ..OrderFilter::default() };
        assert_eq!(lifecycle.list_active(&mine).await.unwrap().len(), 1);
        assert!(lifecycle.list_active(&theirs).await.unwrap().is_empty());
    }
}
