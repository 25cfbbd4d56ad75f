//! Order Assembler: turns validated lines into a persisted, numbered order.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::domain::aggregates::{CartOwner, Customer, NewOrder, Order, OrderLine, PaymentMethod};
use crate::domain::events::OrderEvent;
use crate::domain::pricing::compute_totals;
use crate::domain::value_objects::{OrderNumber, PickupTime};
use crate::error::{OrderingError, Result};
use crate::events::EventPublisher;
use crate::store::{CartRepository, OrderRepository, ORDER_NUMBER_KEY};

/// Attempts at drawing a fresh order number before a collision is reported.
const MAX_NUMBER_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
pub struct OrderRequest {
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
    pub pickup_time: String,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub payment_session_id: Option<String>,
    /// Instant the pickup time must not precede.
    pub reference_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct OrderAssembler {
    orders: Arc<dyn OrderRepository>,
    carts: Arc<dyn CartRepository>,
    events: EventPublisher,
    offset: FixedOffset,
}

impl OrderAssembler {
    pub fn new(orders: Arc<dyn OrderRepository>, carts: Arc<dyn CartRepository>, events: EventPublisher, offset: FixedOffset) -> Self {
        Self { orders, carts, events, offset }
    }

    pub async fn create_order(&self, request: OrderRequest) -> Result<Order> {
        if request.lines.is_empty() {
            return Err(OrderingError::EmptyCart);
        }
        let pickup_time = PickupTime::parse(&request.pickup_time, request.reference_time, self.offset)?;
        if request.total_amount <= Decimal::ZERO {
            return Err(OrderingError::InvalidAmount(request.total_amount));
        }

        let mut attempt = 1;
        loop {
            let order = Order::create(NewOrder {
                order_number: OrderNumber::generate(Utc::now()),
                customer: request.customer.clone(),
                items: request.lines.clone(),
                total_amount: request.total_amount,
                pickup_time,
                payment_method: request.payment_method,
                payment_session_id: request.payment_session_id.clone(),
            })?;

            match self.orders.insert_order(&order).await {
                Ok(()) => {
                    tracing::info!(
                        order_number = %order.order_number(),
                        total = %order.total_amount(),
                        payment_method = ?order.payment_method(),
                        "Order created"
                    );
                    self.events
                        .publish(&OrderEvent::Created {
                            order_number: order.order_number().to_string(),
                            total: order.total_amount(),
                            payment_session_id: order.payment_session_id().map(str::to_string),
                        })
                        .await;
                    return Ok(order);
                }
                Err(OrderingError::Conflict(key)) if key == ORDER_NUMBER_KEY && attempt < MAX_NUMBER_ATTEMPTS => {
                    tracing::warn!(order_number = %order.order_number(), attempt, "Order number collision, regenerating");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Places a pay-at-pickup order from the owner's stored cart, then empties the cart.
    pub async fn place_from_cart(&self, owner: &CartOwner, customer: Customer, pickup_time: &str) -> Result<Order> {
        let cart = self.carts.load_cart(owner).await?.ok_or(OrderingError::EmptyCart)?;
        let totals = compute_totals(cart.lines())?;
        let order = self
            .create_order(OrderRequest {
                customer,
                lines: cart.lines().iter().map(OrderLine::from).collect(),
                pickup_time: pickup_time.to_string(),
                payment_method: PaymentMethod::PayAtPickup,
                total_amount: totals.total,
                payment_session_id: None,
                reference_time: Utc::now(),
            })
            .await?;

        if let Err(e) = self.carts.delete_cart(owner).await {
            tracing::warn!(owner = %owner, order_number = %order.order_number(), error = %e, "Failed to clear cart after order");
        }
        Ok(order)
    }
}
