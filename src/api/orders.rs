use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use super::{ApiError, ApiJson, ApiQuery, AppState, Caller};
use crate::domain::aggregates::{CartOwner, Order, OrderHistoryRecord, OrderStatus, PaymentMethod};
use crate::domain::value_objects::OrderNumber;
use crate::error::OrderingError;
use crate::services::StatusUpdate;
use crate::store::OrderFilter;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 64, message = "pickup time is required"))]
    pub pickup_time: String,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Places a pay-at-pickup order from the caller's cart. Card orders go through checkout.
pub async fn create_order(State(s): State<AppState>, caller: Caller, ApiJson(r): ApiJson<CreateOrderRequest>) -> Result<(StatusCode, Json<Order>), ApiError> {
    r.validate()?;
    let identity = caller.require_identity()?;
    if r.payment_method == Some(PaymentMethod::Card) {
        return Err(OrderingError::validation("paymentMethod", "card orders are placed through checkout-session").into());
    }
    let mut customer = caller.customer();
    if let Some(name) = r.name { customer.name = name; }
    if let Some(email) = r.email { customer.email = email; }
    if let Some(phone) = r.phone { customer.phone = phone; }

    let order = s.orders.place_from_cart(&CartOwner::User(identity.id.clone()), customer, &r.pickup_time).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(State(s): State<AppState>, caller: Caller, ApiQuery(p): ApiQuery<ListOrdersParams>) -> Result<Json<Vec<Order>>, ApiError> {
    caller.require_admin()?;
    Ok(Json(s.lifecycle.list_active(&OrderFilter { status: p.status, identity_id: None }).await?))
}

pub async fn my_orders(State(s): State<AppState>, caller: Caller) -> Result<Json<Vec<Order>>, ApiError> {
    let identity = caller.require_identity()?;
    Ok(Json(s.lifecycle.list_active(&OrderFilter { status: None, identity_id: Some(identity.id.clone()) }).await?))
}

pub async fn order_history(State(s): State<AppState>, caller: Caller, ApiQuery(p): ApiQuery<HistoryParams>) -> Result<Json<Vec<OrderHistoryRecord>>, ApiError> {
    caller.require_admin()?;
    Ok(Json(s.lifecycle.list_history(p.from, p.to).await?))
}

pub async fn update_status(
    State(s): State<AppState>,
    caller: Caller,
    Path(number): Path<String>,
    ApiJson(r): ApiJson<UpdateStatusRequest>,
) -> Result<Json<StatusUpdate>, ApiError> {
    caller.require_admin()?;
    Ok(Json(s.lifecycle.update_status(&OrderNumber::parse(&number), r.status).await?))
}

pub async fn delete_order(State(s): State<AppState>, caller: Caller, Path(number): Path<String>) -> Result<StatusCode, ApiError> {
    let admin = caller.require_admin()?;
    s.lifecycle.delete_order(&OrderNumber::parse(&number), &admin.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn archive_order(State(s): State<AppState>, caller: Caller, Path(number): Path<String>) -> Result<Json<OrderHistoryRecord>, ApiError> {
    caller.require_admin()?;
    Ok(Json(s.lifecycle.move_to_history(&OrderNumber::parse(&number)).await?))
}
