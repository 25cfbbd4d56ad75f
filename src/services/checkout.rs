//! Payment Reconciliation: two-phase card checkout against the payment processor.
//!
//! Phase one opens a processor session whose metadata carries the full order manifest.
//! Phase two, reached from the success redirect, verifies the payment and materializes
//! the order exactly once per session.

use chrono::{FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use super::orders::{OrderAssembler, OrderRequest};
use super::retry_read;
use crate::config::Config;
use crate::domain::aggregates::{CartOwner, Customer, Order, PaymentMethod};
use crate::domain::value_objects::PickupTime;
use crate::error::{OrderingError, Result};
use crate::payments::{
    fits_minor_units, CheckoutSession, CheckoutSessionRequest, GatewayLineItem, ManifestLine, PaymentGateway, PaymentStatus,
    SessionManifest,
};
use crate::store::{CartRepository, OrderRepository, PAYMENT_SESSION_KEY};

/// A line as submitted by the client; completeness is checked here, not at deserialization.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLineInput {
    #[serde(rename = "foodID", alias = "foodId", default)]
    pub food_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct PaymentRequest {
    pub lines: Vec<CheckoutLineInput>,
    pub total_amount: Decimal,
    pub pickup_time: String,
    pub customer: Customer,
}

#[derive(Clone, Debug)]
pub struct ConfirmOutcome {
    pub order: Order,
    /// False when the session had already produced an order.
    pub created: bool,
}

#[derive(Clone)]
pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    assembler: OrderAssembler,
    orders: Arc<dyn OrderRepository>,
    carts: Arc<dyn CartRepository>,
    success_url: String,
    cancel_url: String,
    currency: String,
    offset: FixedOffset,
    read_retries: u32,
}

impl CheckoutService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        assembler: OrderAssembler,
        orders: Arc<dyn OrderRepository>,
        carts: Arc<dyn CartRepository>,
        config: &Config,
    ) -> Self {
        Self {
            gateway,
            assembler,
            orders,
            carts,
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
            currency: config.currency.clone(),
            offset: config.restaurant_offset,
            read_retries: config.read_retries,
        }
    }

    /// Opens a processor session charging exactly `total_amount`.
    pub async fn initiate(&self, request: PaymentRequest) -> Result<CheckoutSession> {
        let lines = manifest_lines(&request.lines, &self.currency)?;
        if request.total_amount <= Decimal::ZERO {
            return Err(OrderingError::InvalidAmount(request.total_amount));
        }
        if !fits_minor_units(request.total_amount, &self.currency) {
            return Err(OrderingError::validation("totalAmount", format!("{} is finer than the smallest {} unit", request.total_amount, self.currency)));
        }
        let initiated_at = Utc::now();
        PickupTime::parse(&request.pickup_time, initiated_at, self.offset)?;

        let subtotal = manifest_subtotal(&lines).ok_or_else(|| OrderingError::InvalidProducts("order subtotal is out of range".into()))?;
        let mut line_items: Vec<GatewayLineItem> = lines
            .iter()
            .map(|l| GatewayLineItem { name: l.name.clone(), unit_amount: l.price, quantity: l.quantity })
            .collect();
        let delta = request.total_amount - subtotal;
        if delta > Decimal::ZERO {
            line_items.push(GatewayLineItem { name: "Service fee".into(), unit_amount: delta, quantity: 1 });
        } else if delta < Decimal::ZERO {
            line_items.push(GatewayLineItem { name: "Discount".into(), unit_amount: delta, quantity: 1 });
        }

        let customer_email = Some(request.customer.email.clone()).filter(|e| !e.is_empty());
        let manifest = SessionManifest { lines, pickup_time: request.pickup_time, customer: request.customer, initiated_at };
        let metadata = manifest.to_metadata()?;

        let session = self
            .gateway
            .create_checkout_session(CheckoutSessionRequest {
                line_items,
                success_url: self.success_url.clone(),
                cancel_url: self.cancel_url.clone(),
                metadata,
                customer_email,
            })
            .await?;
        tracing::info!(session_id = %session.id, total = %request.total_amount, delta = %delta, "Checkout session created");
        Ok(session)
    }

    /// Verifies a session and creates its order. Safe to call any number of times.
    pub async fn confirm(&self, session_id: &str) -> Result<ConfirmOutcome> {
        if let Some(order) = retry_read(self.read_retries, || self.orders.find_by_session(session_id)).await? {
            tracing::debug!(session_id, order_number = %order.order_number(), "Session already confirmed");
            return Ok(ConfirmOutcome { order, created: false });
        }

        let session = retry_read(self.read_retries, || self.gateway.retrieve_session(session_id)).await?;
        if session.payment_status != PaymentStatus::Paid {
            return Err(OrderingError::PaymentNotCompleted(session.payment_status.as_str().to_string()));
        }
        let manifest = SessionManifest::from_metadata(&session.metadata)?;
        if manifest.lines.is_empty() {
            return Err(OrderingError::EmptyOrder);
        }

        let mut customer = manifest.customer;
        if customer.email.is_empty() {
            customer.email = session.customer_email.clone().unwrap_or_default();
        }
        let owner = customer.identity_id.clone().map(CartOwner::User);
        let total_amount = match session.amount_total {
            Some(amount) => amount,
            None => manifest_subtotal(&manifest.lines).ok_or_else(|| OrderingError::CorruptSessionData("manifest subtotal is out of range".into()))?,
        };

        let created = self
            .assembler
            .create_order(OrderRequest {
                customer,
                lines: manifest.lines.iter().map(ManifestLine::to_order_line).collect(),
                pickup_time: manifest.pickup_time,
                payment_method: PaymentMethod::Card,
                total_amount,
                payment_session_id: Some(session.id.clone()),
                reference_time: manifest.initiated_at,
            })
            .await;

        match created {
            Ok(order) => {
                if let Some(owner) = owner {
                    if let Err(e) = self.carts.delete_cart(&owner).await {
                        tracing::warn!(owner = %owner, error = %e, "Failed to clear cart after payment");
                    }
                }
                Ok(ConfirmOutcome { order, created: true })
            }
            Err(OrderingError::Conflict(key)) if key == PAYMENT_SESSION_KEY => {
                let order = self.orders.find_by_session(session_id).await?.ok_or(OrderingError::Conflict(key))?;
                tracing::info!(session_id, order_number = %order.order_number(), "Concurrent confirmation resolved to existing order");
                Ok(ConfirmOutcome { order, created: false })
            }
            Err(e) => Err(e),
        }
    }
}

fn manifest_subtotal(lines: &[ManifestLine]) -> Option<Decimal> {
    lines.iter().try_fold(Decimal::ZERO, |sum, l| l.price.checked_mul(Decimal::from(l.quantity))?.checked_add(sum))
}

fn manifest_lines(inputs: &[CheckoutLineInput], currency: &str) -> Result<Vec<ManifestLine>> {
    if inputs.is_empty() {
        return Err(OrderingError::InvalidProducts("no items to pay for".into()));
    }
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let name = input.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
            match (name, input.price, input.quantity) {
                (Some(_), Some(price), Some(_)) if !fits_minor_units(price, currency) => {
                    Err(OrderingError::InvalidProducts(format!("item {i} price {price} is finer than the smallest {currency} unit")))
                }
                (Some(name), Some(price), Some(quantity)) if price >= Decimal::ZERO && quantity >= 1 => Ok(ManifestLine {
                    food_id: input.food_id.clone().filter(|f| !f.trim().is_empty()),
                    name: name.to_string(),
                    quantity: u32::try_from(quantity).map_err(|_| OrderingError::InvalidProducts(format!("item {i} quantity out of range")))?,
                    price,
                }),
                _ => Err(OrderingError::InvalidProducts(format!("item {i} needs a name, a non-negative price and a positive quantity"))),
            }
        })
        .collect()
}
