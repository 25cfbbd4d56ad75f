use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ApiError, ApiJson, AppState, Caller};
use crate::domain::aggregates::Order;
use crate::error::OrderingError;
use crate::services::{CheckoutLineInput, PaymentRequest};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub phone: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub items: Vec<CheckoutLineInput>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub pickup_time: String,
    #[validate]
    pub customer: Option<CustomerDetails>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub url: String,
}

pub async fn create_session(
    State(s): State<AppState>,
    caller: Caller,
    ApiJson(r): ApiJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    r.validate()?;
    let mut customer = caller.customer();
    if let Some(details) = r.customer {
        customer.name = details.name;
        customer.email = details.email;
        customer.phone = details.phone;
    }
    if customer.identity_id.is_none() && customer.email.is_empty() {
        return Err(OrderingError::validation("customer", "customer details are required for guest checkout").into());
    }

    let session = s
        .checkout
        .initiate(PaymentRequest { lines: r.items, total_amount: r.total_amount, pickup_time: r.pickup_time, customer })
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse { session_id: session.id, url: session.url })))
}

/// Landing call from the processor's success redirect.
pub async fn confirm_session(State(s): State<AppState>, Path(session_id): Path<String>) -> Result<(StatusCode, Json<Order>), ApiError> {
    let outcome = s.checkout.confirm(&session_id).await?;
    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(outcome.order)))
}
