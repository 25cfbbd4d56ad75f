//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::aggregates::CartLine;
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{FoodId, OrderNumber, PickupTime};
use crate::error::OrderingError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Uuid,
    order_number: OrderNumber,
    customer: Customer,
    items: Vec<OrderLine>,
    total_amount: Decimal,
    pickup_time: DateTime<Utc>,
    status: OrderStatus,
    payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payment_session_id: Option<String>,
    order_date: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Snapshot of a cart line at order time; never re-read from the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(rename = "foodID")]
    pub food_id: Option<FoodId>,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OrderLine {
    /// `None` when the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> { self.unit_price.checked_mul(Decimal::from(self.quantity)) }
}

impl From<&CartLine> for OrderLine {
    fn from(l: &CartLine) -> Self {
        Self { food_id: Some(l.food_id.clone()), name: l.name.clone(), unit_price: l.unit_price, quantity: l.quantity, category: l.category.clone(), image: l.image.clone() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Card, PayAtPickup }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Preparing, Ready, Completed, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [Self::Pending, Self::Confirmed, Self::Preparing, Self::Ready, Self::Completed, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Preparing => "preparing",
            Self::Ready => "ready", Self::Completed => "completed", Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Completed | Self::Cancelled) }

    /// Position in the forward sequence; `Cancelled` sits outside it.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0), Self::Confirmed => Some(1), Self::Preparing => Some(2),
            Self::Ready => Some(3), Self::Completed => Some(4), Self::Cancelled => None,
        }
    }

    /// Transition table: strictly forward (skips allowed), or cancel from any non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() { return false; }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    pub fn allowed_transitions(&self) -> Vec<OrderStatus> {
        Self::ALL.into_iter().filter(|s| self.can_transition_to(*s)).collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OrderingError::validation("status", format!("unknown status '{s}'")))
    }
}

/// Everything the assembler has validated, ready to become an order.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer: Customer,
    pub items: Vec<OrderLine>,
    pub total_amount: Decimal,
    pub pickup_time: PickupTime,
    pub payment_method: PaymentMethod,
    pub payment_session_id: Option<String>,
}

impl Order {
    pub fn create(new: NewOrder) -> Result<Self, OrderingError> {
        if new.items.is_empty() { return Err(OrderingError::EmptyCart); }
        if new.total_amount <= Decimal::ZERO { return Err(OrderingError::InvalidAmount(new.total_amount)); }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), order_number: new.order_number, customer: new.customer, items: new.items,
            total_amount: new.total_amount, pickup_time: new.pickup_time.at(), status: OrderStatus::Pending,
            payment_method: new.payment_method, payment_session_id: new.payment_session_id,
            order_date: now, updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &OrderNumber { &self.order_number }
    pub fn customer(&self) -> &Customer { &self.customer }
    pub fn items(&self) -> &[OrderLine] { &self.items }
    pub fn total_amount(&self) -> Decimal { self.total_amount }
    pub fn pickup_time(&self) -> DateTime<Utc> { self.pickup_time }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_session_id(&self) -> Option<&str> { self.payment_session_id.as_deref() }
    pub fn order_date(&self) -> DateTime<Utc> { self.order_date }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<OrderEvent, OrderingError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderingError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(OrderEvent::StatusChanged { order_number: self.order_number.to_string(), from, to: next })
    }

    /// Consumes the order into its archived form. Only terminal orders qualify.
    pub fn into_history(self) -> Result<OrderHistoryRecord, (Self, OrderingError)> {
        if !self.status.is_terminal() {
            let err = OrderingError::InvalidStateForArchival { order_number: self.order_number.to_string(), status: self.status };
            return Err((self, err));
        }
        Ok(OrderHistoryRecord { order: self, accepted_date: Utc::now() })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistoryRecord {
    #[serde(flatten)]
    pub order: Order,
    pub accepted_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn sample_order() -> Order {
        let now = Utc::now();
        Order::create(NewOrder {
            order_number: OrderNumber::generate(now),
            customer: Customer { identity_id: Some("u1".into()), name: "Kim".into(), email: "kim@example.com".into(), phone: "010".into() },
            items: vec![OrderLine { food_id: Some(FoodId::new("A").unwrap()), name: "Bibimbap".into(), unit_price: Decimal::new(9000, 0), quantity: 2, category: "main".into(), image: None }],
            total_amount: Decimal::new(18900, 0),
            pickup_time: PickupTime::parse(&(now + chrono::Duration::minutes(30)).to_rfc3339(), now, FixedOffset::east_opt(0).unwrap()).unwrap(),
            payment_method: PaymentMethod::PayAtPickup,
            payment_session_id: None,
        })
        .unwrap()
    }

    #[test]
    fn test_forward_path() {
        let mut order = sample_order();
        assert_eq!(order.status(), OrderStatus::Pending);
        for next in [OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Completed] {
            order.transition_to(next).unwrap();
        }
        assert_eq!(order.status(), OrderStatus::Completed);
    }

    #[test]
    fn test_backward_and_terminal_rejected() {
        let mut order = sample_order();
        order.transition_to(OrderStatus::Preparing).unwrap();
        assert!(matches!(order.transition_to(OrderStatus::Confirmed), Err(OrderingError::InvalidTransition { .. })));
        assert!(matches!(order.transition_to(OrderStatus::Preparing), Err(OrderingError::InvalidTransition { .. })));
        order.transition_to(OrderStatus::Cancelled).unwrap();
        assert!(order.transition_to(OrderStatus::Completed).is_err());
        assert!(order.transition_to(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_skip_ahead_allowed() {
        let mut order = sample_order();
        order.transition_to(OrderStatus::Ready).unwrap();
        assert_eq!(OrderStatus::Ready.allowed_transitions(), vec![OrderStatus::Completed, OrderStatus::Cancelled]);
    }

    #[test]
    fn test_archival_requires_terminal() {
        let order = sample_order();
        let (order, err) = order.into_history().unwrap_err();
        assert!(matches!(err, OrderingError::InvalidStateForArchival { status: OrderStatus::Pending, .. }));
        let mut order = order;
        order.transition_to(OrderStatus::Completed).unwrap();
        let record = order.into_history().unwrap();
        assert_eq!(record.order.status(), OrderStatus::Completed);
    }

    #[test]
    fn test_create_validates() {
        let mut new = NewOrder {
            order_number: OrderNumber::parse("ORD-1"), customer: Customer::default(), items: vec![], total_amount: Decimal::ONE,
            pickup_time: PickupTime::parse("2099-01-01T00:00:00Z", Utc::now(), FixedOffset::east_opt(0).unwrap()).unwrap(),
            payment_method: PaymentMethod::Card, payment_session_id: None,
        };
        assert!(matches!(Order::create(new.clone()), Err(OrderingError::EmptyCart)));
        new.items = sample_order().items().to_vec();
        new.total_amount = Decimal::ZERO;
        assert!(matches!(Order::create(new), Err(OrderingError::InvalidAmount(_))));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Ready".parse::<OrderStatus>().unwrap(), OrderStatus::Ready);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
