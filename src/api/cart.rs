use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ApiError, ApiJson, AppState, Caller};
use crate::domain::aggregates::{Cart, CartLine, CartOwner};
use crate::domain::pricing::{compute_totals, PriceBreakdown};
use crate::domain::value_objects::FoodId;
use crate::error::OrderingError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub owner: CartOwner,
    pub items: Vec<CartLine>,
    pub totals: PriceBreakdown,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<Cart> for CartResponse {
    type Error = OrderingError;
    fn try_from(cart: Cart) -> Result<Self, Self::Error> {
        let totals = compute_totals(cart.lines())?;
        Ok(Self { owner: cart.owner().clone(), items: cart.lines().to_vec(), totals, updated_at: cart.updated_at() })
    }
}

fn respond(cart: Cart) -> Result<Json<CartResponse>, ApiError> { Ok(Json(CartResponse::try_from(cart)?)) }

#[derive(Debug, Deserialize, Validate)]
pub struct SaveCartRequest {
    #[validate(length(max = 200, message = "too many lines"))]
    pub items: Vec<CartLine>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    #[serde(rename = "foodID", alias = "foodId")]
    pub food_id: FoodId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

pub async fn get_cart(State(s): State<AppState>, caller: Caller) -> Result<Json<CartResponse>, ApiError> {
    respond(s.carts.get(&caller.cart_owner()?).await?)
}

pub async fn save_cart(State(s): State<AppState>, caller: Caller, ApiJson(r): ApiJson<SaveCartRequest>) -> Result<Json<CartResponse>, ApiError> {
    r.validate()?;
    respond(s.carts.replace(&caller.cart_owner()?, r.items).await?)
}

pub async fn clear_cart(State(s): State<AppState>, caller: Caller) -> Result<StatusCode, ApiError> {
    s.carts.clear(&caller.cart_owner()?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_item(State(s): State<AppState>, caller: Caller, ApiJson(r): ApiJson<AddItemRequest>) -> Result<Json<CartResponse>, ApiError> {
    respond(s.carts.add_menu_item(&caller.cart_owner()?, &r.food_id).await?)
}

pub async fn update_item(
    State(s): State<AppState>,
    caller: Caller,
    Path(food_id): Path<String>,
    ApiJson(r): ApiJson<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let food_id = FoodId::new(food_id)?;
    respond(s.carts.update_quantity(&caller.cart_owner()?, &food_id, r.quantity).await?)
}

pub async fn remove_item(State(s): State<AppState>, caller: Caller, Path(food_id): Path<String>) -> Result<Json<CartResponse>, ApiError> {
    let food_id = FoodId::new(food_id)?;
    respond(s.carts.remove_item(&caller.cart_owner()?, &food_id).await?)
}

/// Called right after sign-in with both the identity headers and the guest session header.
pub async fn merge_carts(State(s): State<AppState>, caller: Caller) -> Result<Json<CartResponse>, ApiError> {
    let identity = caller.require_identity()?;
    let session = caller
        .session_id
        .clone()
        .ok_or_else(|| OrderingError::validation("x-session-id", "guest session header is required to merge carts"))?;
    let merged = s.carts.merge(&CartOwner::Guest(session), &CartOwner::User(identity.id.clone())).await?;
    respond(merged)
}
