use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{CartRepository, MenuRepository, OrderFilter, OrderRepository, ORDER_NUMBER_KEY, PAYMENT_SESSION_KEY};
use crate::domain::aggregates::{Cart, CartOwner, MenuItem, Order, OrderHistoryRecord, OrderStatus};
use crate::domain::value_objects::{FoodId, OrderNumber};
use crate::error::{OrderingError, Result};

/// In-process store used when no database is configured, and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    carts: HashMap<String, Cart>,
    orders: HashMap<String, Order>,
    history: HashMap<String, OrderHistoryRecord>,
    sessions: HashMap<String, String>,
    menu: BTreeMap<FoodId, MenuItem>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn load_cart(&self, owner: &CartOwner) -> Result<Option<Cart>> {
        Ok(self.state.read().await.carts.get(&owner.key()).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.state.write().await.carts.insert(cart.owner().key(), cart.clone());
        Ok(())
    }

    async fn delete_cart(&self, owner: &CartOwner) -> Result<()> {
        self.state.write().await.carts.remove(&owner.key());
        Ok(())
    }

    async fn save_merged(&self, merged: &Cart, cleared: &CartOwner) -> Result<()> {
        let mut state = self.state.write().await;
        state.carts.insert(merged.owner().key(), merged.clone());
        state.carts.remove(&cleared.key());
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().await;
        let number = order.order_number().to_string();
        if state.orders.contains_key(&number) || state.history.contains_key(&number) {
            return Err(OrderingError::Conflict(ORDER_NUMBER_KEY.to_string()));
        }
        if let Some(session) = order.payment_session_id() {
            if state.sessions.contains_key(session) {
                return Err(OrderingError::Conflict(PAYMENT_SESSION_KEY.to_string()));
            }
            state.sessions.insert(session.to_string(), number.clone());
        }
        state.orders.insert(number, order.clone());
        Ok(())
    }

    async fn find_order(&self, number: &OrderNumber) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(number.as_str()).cloned())
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        let Some(number) = state.sessions.get(session_id) else { return Ok(None) };
        Ok(state
            .orders
            .get(number)
            .cloned()
            .or_else(|| state.history.get(number).map(|r| r.order.clone())))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state.orders.values().filter(|o| filter.matches(o)).cloned().collect();
        orders.sort_by(|a, b| b.order_date().cmp(&a.order_date()));
        Ok(orders)
    }

    async fn update_order(&self, order: &Order, expected: OrderStatus) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(order.order_number().as_str()) {
            Some(stored) if stored.status() == expected => {
                *stored = order.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_order(&self, number: &OrderNumber) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(order) = state.orders.remove(number.as_str()) else { return Ok(false) };
        if let Some(session) = order.payment_session_id() {
            state.sessions.remove(session);
        }
        Ok(true)
    }

    async fn archive_order(&self, record: &OrderHistoryRecord) -> Result<bool> {
        let mut state = self.state.write().await;
        let number = record.order.order_number().to_string();
        match state.orders.get(&number) {
            Some(active) if active.status() == record.order.status() => {}
            _ => return Ok(false),
        }
        state.orders.remove(&number);
        state.history.insert(number, record.clone());
        Ok(true)
    }

    async fn list_history(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<Vec<OrderHistoryRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<OrderHistoryRecord> = state
            .history
            .values()
            .filter(|r| from.map_or(true, |f| r.order.order_date() >= f) && to.map_or(true, |t| r.order.order_date() < t))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.order.order_date());
        Ok(records)
    }
}

#[async_trait]
impl MenuRepository for MemoryStore {
    async fn list_menu(&self) -> Result<Vec<MenuItem>> {
        Ok(self.state.read().await.menu.values().cloned().collect())
    }

    async fn find_menu_item(&self, food_id: &FoodId) -> Result<Option<MenuItem>> {
        Ok(self.state.read().await.menu.get(food_id).cloned())
    }

    async fn save_menu_item(&self, item: &MenuItem) -> Result<()> {
        self.state.write().await.menu.insert(item.food_id().clone(), item.clone());
        Ok(())
    }

    async fn delete_menu_item(&self, food_id: &FoodId) -> Result<bool> {
        Ok(self.state.write().await.menu.remove(food_id).is_some())
    }
}
