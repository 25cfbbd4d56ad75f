//! Payment processor seam and the session manifest carried through it.

pub mod manifest;
mod stripe;

pub use manifest::{ManifestLine, SessionManifest};
pub use stripe::StripeGateway;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::error::Result;

/// Currencies charged in whole units.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv", "xaf", "xof", "xpf",
];

/// Decimal places of the currency's minor unit: 0 for KRW or JPY, 2 otherwise.
pub fn minor_unit_scale(currency: &str) -> u32 {
    if ZERO_DECIMAL_CURRENCIES.contains(&currency.to_lowercase().as_str()) { 0 } else { 2 }
}

/// Whether `amount` is a whole number of minor units, so it can be charged without rounding.
pub fn fits_minor_units(amount: Decimal, currency: &str) -> bool {
    amount.normalize().scale() <= minor_unit_scale(currency)
}

#[derive(Clone, Debug, PartialEq)]
pub struct GatewayLineItem {
    pub name: String,
    /// Per-unit amount in major currency units. Negative for a discount line.
    pub unit_amount: Decimal,
    pub quantity: u32,
}

#[derive(Clone, Debug)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<GatewayLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
    pub customer_email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "paid" => Self::Paid,
            "unpaid" => Self::Unpaid,
            "no_payment_required" => Self::NoPaymentRequired,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::NoPaymentRequired => "no_payment_required",
            Self::Other(s) => s,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionDetails {
    pub id: String,
    pub payment_status: PaymentStatus,
    /// Charged amount in major currency units.
    pub amount_total: Option<Decimal>,
    pub metadata: BTreeMap<String, String>,
    pub customer_email: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<CheckoutSession>;
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails>;
}
