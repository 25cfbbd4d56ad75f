use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::types::Json;

use super::{CartRepository, MenuRepository, OrderFilter, OrderRepository};
use crate::domain::aggregates::{Cart, CartOwner, MenuItem, Order, OrderHistoryRecord, OrderStatus};
use crate::domain::value_objects::{FoodId, OrderNumber};
use crate::error::Result;

/// PostgreSQL backend. Each aggregate lives in a JSONB `document` column next to the
/// indexed key columns that carry the uniqueness constraints.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn load_cart(&self, owner: &CartOwner) -> Result<Option<Cart>> {
        let row: Option<(Json<Cart>,)> = sqlx::query_as("SELECT document FROM carts WHERE owner_key = $1")
            .bind(owner.key())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(cart),)| cart))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        sqlx::query("INSERT INTO carts (owner_key, document, updated_at) VALUES ($1, $2, $3) ON CONFLICT (owner_key) DO UPDATE SET document = EXCLUDED.document, updated_at = EXCLUDED.updated_at")
            .bind(cart.owner().key())
            .bind(Json(cart))
            .bind(cart.updated_at())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_cart(&self, owner: &CartOwner) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE owner_key = $1").bind(owner.key()).execute(&self.pool).await?;
        Ok(())
    }

    async fn save_merged(&self, merged: &Cart, cleared: &CartOwner) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO carts (owner_key, document, updated_at) VALUES ($1, $2, $3) ON CONFLICT (owner_key) DO UPDATE SET document = EXCLUDED.document, updated_at = EXCLUDED.updated_at")
            .bind(merged.owner().key())
            .bind(Json(merged))
            .bind(merged.updated_at())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM carts WHERE owner_key = $1").bind(cleared.key()).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query("INSERT INTO orders (id, order_number, payment_session_id, identity_id, status, order_date, document) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(order.id())
            .bind(order.order_number().as_str())
            .bind(order.payment_session_id())
            .bind(order.customer().identity_id.as_deref())
            .bind(order.status().as_str())
            .bind(order.order_date())
            .bind(Json(order))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_order(&self, number: &OrderNumber) -> Result<Option<Order>> {
        let row: Option<(Json<Order>,)> = sqlx::query_as("SELECT document FROM orders WHERE order_number = $1 AND archived_at IS NULL")
            .bind(number.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(order),)| order))
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>> {
        let row: Option<(Json<Order>,)> = sqlx::query_as("SELECT document FROM orders WHERE payment_session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(order),)| order))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let rows: Vec<(Json<Order>,)> = sqlx::query_as(
            "SELECT document FROM orders WHERE archived_at IS NULL AND ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR identity_id = $2) ORDER BY order_date DESC",
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.identity_id.as_deref())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(order),)| order).collect())
    }

    async fn update_order(&self, order: &Order, expected: OrderStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET status = $2, document = $3 WHERE order_number = $1 AND status = $4 AND archived_at IS NULL")
            .bind(order.order_number().as_str())
            .bind(order.status().as_str())
            .bind(Json(order))
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_order(&self, number: &OrderNumber) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE order_number = $1 AND archived_at IS NULL")
            .bind(number.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn archive_order(&self, record: &OrderHistoryRecord) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET archived_at = $3, document = $4 WHERE order_number = $1 AND status = $2 AND archived_at IS NULL")
            .bind(record.order.order_number().as_str())
            .bind(record.order.status().as_str())
            .bind(record.accepted_date)
            .bind(Json(record))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_history(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<Vec<OrderHistoryRecord>> {
        let rows: Vec<(Json<OrderHistoryRecord>,)> = sqlx::query_as(
            "SELECT document FROM orders WHERE archived_at IS NOT NULL AND ($1::timestamptz IS NULL OR order_date >= $1) AND ($2::timestamptz IS NULL OR order_date < $2) ORDER BY order_date",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(Json(record),)| record).collect())
    }
}

#[async_trait]
impl MenuRepository for PgStore {
    async fn list_menu(&self) -> Result<Vec<MenuItem>> {
        let rows: Vec<(Json<MenuItem>,)> = sqlx::query_as("SELECT document FROM menu_items ORDER BY food_id").fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(item),)| item).collect())
    }

    async fn find_menu_item(&self, food_id: &FoodId) -> Result<Option<MenuItem>> {
        let row: Option<(Json<MenuItem>,)> = sqlx::query_as("SELECT document FROM menu_items WHERE food_id = $1")
            .bind(food_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(item),)| item))
    }

    async fn save_menu_item(&self, item: &MenuItem) -> Result<()> {
        sqlx::query("INSERT INTO menu_items (food_id, category, document) VALUES ($1, $2, $3) ON CONFLICT (food_id) DO UPDATE SET category = EXCLUDED.category, document = EXCLUDED.document")
            .bind(item.food_id().as_str())
            .bind(item.category())
            .bind(Json(item))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_menu_item(&self, food_id: &FoodId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM menu_items WHERE food_id = $1").bind(food_id.as_str()).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }
}
