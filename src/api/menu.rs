use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use super::{ApiError, ApiJson, ApiQuery, AppState, Caller};
use crate::domain::aggregates::{MenuItem, MenuItemDetails};
use crate::domain::value_objects::FoodId;
use crate::error::OrderingError;

#[derive(Debug, Deserialize)]
pub struct MenuParams {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemPayload {
    #[serde(rename = "foodID", alias = "foodId", default)]
    #[validate(length(min = 1, max = 64))]
    pub food_id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,
    pub price: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(url)]
    pub image: Option<String>,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

fn available_by_default() -> bool { true }

impl MenuItemPayload {
    fn details(self) -> MenuItemDetails {
        MenuItemDetails { name: self.name, description: self.description, price: self.price, category: self.category, image: self.image, available: self.available }
    }
}

/// Admins also see unavailable items.
pub async fn list_menu(State(s): State<AppState>, caller: Caller, ApiQuery(p): ApiQuery<MenuParams>) -> Result<Json<Vec<MenuItem>>, ApiError> {
    Ok(Json(s.menu.list(caller.is_admin(), p.category.as_deref()).await?))
}

pub async fn create_item(State(s): State<AppState>, caller: Caller, ApiJson(r): ApiJson<MenuItemPayload>) -> Result<(StatusCode, Json<MenuItem>), ApiError> {
    caller.require_admin()?;
    r.validate()?;
    let food_id = r.food_id.clone().ok_or_else(|| OrderingError::validation("foodID", "is required"))?;
    let item = s.menu.create(FoodId::new(food_id)?, r.details()).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn upsert_item(
    State(s): State<AppState>,
    caller: Caller,
    Path(food_id): Path<String>,
    ApiJson(r): ApiJson<MenuItemPayload>,
) -> Result<Json<MenuItem>, ApiError> {
    caller.require_admin()?;
    r.validate()?;
    Ok(Json(s.menu.upsert(FoodId::new(food_id)?, r.details()).await?))
}

pub async fn delete_item(State(s): State<AppState>, caller: Caller, Path(food_id): Path<String>) -> Result<StatusCode, ApiError> {
    let admin = caller.require_admin()?;
    s.menu.delete(&FoodId::new(food_id)?, &admin.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
