//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::OrderStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_number: String, total: Decimal, payment_session_id: Option<String> },
    StatusChanged { order_number: String, from: OrderStatus, to: OrderStatus },
    Archived { order_number: String, status: OrderStatus },
    Deleted { order_number: String, actor: String },
}

impl OrderEvent {
    pub fn order_number(&self) -> &str {
        match self {
            Self::Created { order_number, .. }
            | Self::StatusChanged { order_number, .. }
            | Self::Archived { order_number, .. }
            | Self::Deleted { order_number, .. } => order_number,
        }
    }

    /// NATS subject suffix, e.g. `orders.status_changed`.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Created { .. } => "orders.created",
            Self::StatusChanged { .. } => "orders.status_changed",
            Self::Archived { .. } => "orders.archived",
            Self::Deleted { .. } => "orders.deleted",
        }
    }
}
