//! Persistence seams.
//!
//! Carts and orders are stored as whole documents: every write replaces a document
//! atomically, so a reader sees either the old or the new cart, never a partial one.
//! Order numbers and payment session ids are unique across active and archived orders.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::aggregates::{Cart, CartOwner, MenuItem, Order, OrderHistoryRecord, OrderStatus};
use crate::domain::value_objects::{FoodId, OrderNumber};
use crate::error::Result;

/// Constraint names reported in `OrderingError::Conflict` by every backend.
pub const ORDER_NUMBER_KEY: &str = "orders_order_number_key";
pub const PAYMENT_SESSION_KEY: &str = "orders_payment_session_id_key";

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn load_cart(&self, owner: &CartOwner) -> Result<Option<Cart>>;
    async fn save_cart(&self, cart: &Cart) -> Result<()>;
    async fn delete_cart(&self, owner: &CartOwner) -> Result<()>;
    /// Stores `merged` and deletes the cart owned by `cleared` in one step.
    async fn save_merged(&self, merged: &Cart, cleared: &CartOwner) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub identity_id: Option<String>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status() == s)
            && self.identity_id.as_deref().map_or(true, |id| order.customer().identity_id.as_deref() == Some(id))
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fails with `Conflict(ORDER_NUMBER_KEY)` or `Conflict(PAYMENT_SESSION_KEY)` on duplicates.
    async fn insert_order(&self, order: &Order) -> Result<()>;
    async fn find_order(&self, number: &OrderNumber) -> Result<Option<Order>>;
    /// Looks in both active and archived orders.
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>>;
    /// Active orders, newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>>;
    /// Replaces the stored order only if its status is still `expected`. Returns whether it did.
    async fn update_order(&self, order: &Order, expected: OrderStatus) -> Result<bool>;
    async fn delete_order(&self, number: &OrderNumber) -> Result<bool>;
    /// Moves an active order into history. Returns false when it is no longer active
    /// or its status no longer matches the record.
    async fn archive_order(&self, record: &OrderHistoryRecord) -> Result<bool>;
    /// Archived orders whose order date falls in `[from, to)`, oldest first.
    async fn list_history(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<Vec<OrderHistoryRecord>>;
}

#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn list_menu(&self) -> Result<Vec<MenuItem>>;
    async fn find_menu_item(&self, food_id: &FoodId) -> Result<Option<MenuItem>>;
    async fn save_menu_item(&self, item: &MenuItem) -> Result<()>;
    async fn delete_menu_item(&self, food_id: &FoodId) -> Result<bool>;
}

/// A backend implementing every repository.
pub trait Store: CartRepository + OrderRepository + MenuRepository {}

impl<T: CartRepository + OrderRepository + MenuRepository> Store for T {}
