//! Stripe Checkout via the REST API (no SDK dependency)

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{fits_minor_units, minor_unit_scale, CheckoutSession, CheckoutSessionRequest, PaymentGateway, PaymentStatus, SessionDetails};
use crate::error::{OrderingError, Result};

#[derive(Clone, Debug)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
    currency: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>, currency: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrderingError::PaymentProvider(format!("http client: {e}")))?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            currency: currency.into().to_lowercase(),
        })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(&self, path: &str, form: &[(String, String)]) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    /// One-off coupon standing in for a negative line item, which Checkout does not accept.
    async fn create_discount_coupon(&self, amount: Decimal) -> Result<String> {
        let form = vec![
            ("amount_off".to_string(), to_minor_units(amount, &self.currency)?.to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("duration".to_string(), "once".to_string()),
            ("name".to_string(), "Discount".to_string()),
        ];
        let coupon: IdObject = self.post_form("/v1/coupons", &form).await?;
        Ok(coupon.id)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> Result<CheckoutSession> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), request.success_url),
            ("cancel_url".into(), request.cancel_url),
        ];
        if let Some(email) = request.customer_email.filter(|e| !e.is_empty()) {
            form.push(("customer_email".into(), email));
        }

        let mut discount = Decimal::ZERO;
        let mut index = 0;
        for item in &request.line_items {
            if item.unit_amount < Decimal::ZERO {
                discount = item
                    .unit_amount
                    .abs()
                    .checked_mul(Decimal::from(item.quantity))
                    .and_then(|d| discount.checked_add(d))
                    .ok_or_else(|| OrderingError::validation("totalAmount", "discount is out of range"))?;
                continue;
            }
            let prefix = format!("line_items[{index}]");
            form.push((format!("{prefix}[price_data][currency]"), self.currency.clone()));
            form.push((format!("{prefix}[price_data][product_data][name]"), item.name.clone()));
            form.push((format!("{prefix}[price_data][unit_amount]"), to_minor_units(item.unit_amount, &self.currency)?.to_string()));
            form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            index += 1;
        }
        if discount > Decimal::ZERO {
            let coupon = self.create_discount_coupon(discount).await?;
            form.push(("discounts[0][coupon]".into(), coupon));
        }
        for (key, value) in request.metadata {
            form.push((format!("metadata[{key}]"), value));
        }

        let session: SessionObject = self.post_form("/v1/checkout/sessions", &form).await?;
        let url = session.url.ok_or_else(|| OrderingError::PaymentProvider(format!("session {} has no redirect url", session.id)))?;
        Ok(CheckoutSession { id: session.id, url })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionDetails> {
        if session_id.is_empty() || !session_id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(OrderingError::NotFound("checkout session".to_string()));
        }
        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{session_id}", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(transport_error)?;
        let session: SessionObject = decode(response).await?;
        let currency = session.currency.as_deref().unwrap_or(&self.currency);
        Ok(SessionDetails {
            amount_total: session.amount_total.map(|minor| from_minor_units(minor, currency)),
            payment_status: PaymentStatus::parse(&session.payment_status),
            customer_email: session.customer_email.or_else(|| session.customer_details.and_then(|d| d.email)),
            metadata: session.metadata,
            id: session.id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    url: Option<String>,
    #[serde(default)]
    payment_status: String,
    amount_total: Option<i64>,
    currency: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn transport_error(e: reqwest::Error) -> OrderingError {
    if e.is_timeout() || e.is_connect() {
        OrderingError::UpstreamUnavailable(format!("payment processor: {e}"))
    } else {
        OrderingError::PaymentProvider(e.to_string())
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| OrderingError::PaymentProvider(format!("unexpected response: {e}")));
    }
    let message = response
        .json::<ErrorEnvelope>()
        .await
        .ok()
        .and_then(|env| env.error.message)
        .unwrap_or_else(|| status.to_string());
    tracing::warn!(status = %status, message = %message, "Stripe request failed");
    match status.as_u16() {
        404 => Err(OrderingError::NotFound("checkout session".to_string())),
        429 | 500..=599 => Err(OrderingError::UpstreamUnavailable(format!("payment processor: {message}"))),
        _ => Err(OrderingError::PaymentProvider(message)),
    }
}

/// Exact conversion; amounts finer than the minor unit are refused rather than rounded.
pub(crate) fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64> {
    if !fits_minor_units(amount, currency) {
        return Err(OrderingError::validation("items", format!("{amount} is not a whole number of {currency} minor units")));
    }
    let scale = Decimal::from(10i64.pow(minor_unit_scale(currency)));
    amount
        .checked_mul(scale)
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| OrderingError::validation("items", format!("{amount} is out of range")))
}

pub(crate) fn from_minor_units(minor: i64, currency: &str) -> Decimal {
    Decimal::new(minor, minor_unit_scale(currency))
}
