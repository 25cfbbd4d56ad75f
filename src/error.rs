//! Error taxonomy shared by the domain, services and HTTP layer.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::aggregates::OrderStatus;

#[derive(Error, Debug)]
pub enum OrderingError {
    #[error("invalid cart line {food_id}: {reason}")]
    InvalidLine { food_id: String, reason: &'static str },

    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid pickup time: {0}")]
    InvalidPickupTime(String),

    #[error("invalid amount {0}: must be positive")]
    InvalidAmount(Decimal),

    #[error("invalid products: {0}")]
    InvalidProducts(String),

    #[error("payment not completed (status: {0})")]
    PaymentNotCompleted(String),

    #[error("corrupt session data: {0}")]
    CorruptSessionData(String),

    #[error("order has no items")]
    EmptyOrder,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order {order_number} is {status}; only completed or cancelled orders can be archived")]
    InvalidStateForArchival { order_number: String, status: OrderStatus },

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("payment provider rejected the request: {0}")]
    PaymentProvider(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Coarse classification used for status codes and retry decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    UpstreamUnavailable,
    Authorization,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Conflict => "conflict",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Authorization => "authorization_error",
            Self::NotFound => "not_found",
            Self::Internal => "internal_error",
        }
    }
}

impl OrderingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLine { .. }
            | Self::EmptyCart
            | Self::InvalidPickupTime(_)
            | Self::InvalidAmount(_)
            | Self::InvalidProducts(_)
            | Self::PaymentNotCompleted(_)
            | Self::CorruptSessionData(_)
            | Self::EmptyOrder
            | Self::InvalidTransition { .. }
            | Self::InvalidStateForArchival { .. }
            | Self::Validation { .. } => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized | Self::Forbidden(_) => ErrorKind::Authorization,
            Self::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::PaymentProvider(_) | Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Name of the offending input, for field-level validation responses.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidLine { .. } | Self::InvalidProducts(_) => Some("items"),
            Self::EmptyCart | Self::EmptyOrder => Some("items"),
            Self::InvalidPickupTime(_) => Some("pickupTime"),
            Self::InvalidAmount(_) => Some("totalAmount"),
            Self::InvalidTransition { .. } => Some("status"),
            Self::PaymentNotCompleted(_) | Self::CorruptSessionData(_) => Some("sessionId"),
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::UpstreamUnavailable
    }
}

impl From<validator::ValidationErrors> for OrderingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .or_else(|| errs.first().map(|e| e.code.to_string()))
                    .unwrap_or_else(|| "invalid".to_string());
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("request".to_string(), "invalid".to_string()));
        Self::Validation { field, message }
    }
}

impl From<sqlx::Error> for OrderingError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => Self::NotFound("record".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
                Self::UpstreamUnavailable(e.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.constraint().unwrap_or("unique constraint").to_string())
            }
            _ => Self::Storage(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for OrderingError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("document encoding: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, OrderingError>;
