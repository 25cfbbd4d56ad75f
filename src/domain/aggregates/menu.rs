//! Menu Item Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::CartLine;
use crate::domain::value_objects::FoodId;
use crate::error::OrderingError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[serde(rename = "foodID")]
    food_id: FoodId,
    name: String,
    description: String,
    price: Decimal,
    category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Editable fields of a menu item.
#[derive(Clone, Debug)]
pub struct MenuItemDetails {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub image: Option<String>,
    pub available: bool,
}

impl MenuItemDetails {
    fn validate(&self) -> Result<(), OrderingError> {
        if self.name.trim().is_empty() { return Err(OrderingError::validation("name", "must not be empty")); }
        if self.category.trim().is_empty() { return Err(OrderingError::validation("category", "must not be empty")); }
        if self.price < Decimal::ZERO { return Err(OrderingError::validation("price", "must not be negative")); }
        Ok(())
    }
}

impl MenuItem {
    pub fn create(food_id: FoodId, details: MenuItemDetails) -> Result<Self, OrderingError> {
        details.validate()?;
        let now = Utc::now();
        Ok(Self {
            food_id, name: details.name.trim().to_string(), description: details.description, price: details.price,
            category: details.category.trim().to_string(), image: details.image, available: details.available,
            created_at: now, updated_at: now,
        })
    }

    pub fn food_id(&self) -> &FoodId { &self.food_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> Decimal { self.price }
    pub fn category(&self) -> &str { &self.category }
    pub fn is_available(&self) -> bool { self.available }

    pub fn update(&mut self, details: MenuItemDetails) -> Result<(), OrderingError> {
        details.validate()?;
        self.name = details.name.trim().to_string();
        self.description = details.description;
        self.price = details.price;
        self.category = details.category.trim().to_string();
        self.image = details.image;
        self.available = details.available;
        self.touch();
        Ok(())
    }

    /// Cart line snapshot of this item, quantity 1.
    pub fn to_cart_line(&self) -> CartLine {
        CartLine {
            food_id: self.food_id.clone(), name: self.name.clone(), unit_price: self.price, quantity: 1,
            category: self.category.clone(), image: self.image.clone(),
            description: Some(self.description.clone()).filter(|d| !d.is_empty()),
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
