//! Sales reporting over archived orders.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::retry_read;
use crate::domain::aggregates::{OrderHistoryRecord, OrderStatus};
use crate::error::{OrderingError, Result};
use crate::store::OrderRepository;

const TOP_ITEMS: usize = 5;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub completed_orders: usize,
    pub cancelled_orders: usize,
    pub revenue: Decimal,
    pub average_order_value: Decimal,
    pub daily: Vec<DailySales>,
    pub top_items: Vec<ItemSales>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySales {
    pub date: NaiveDate,
    pub orders: usize,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSales {
    #[serde(rename = "foodID", skip_serializing_if = "Option::is_none")]
    pub food_id: Option<String>,
    pub name: String,
    pub quantity: u64,
    pub revenue: Decimal,
}

#[derive(Clone)]
pub struct ReportService {
    orders: Arc<dyn OrderRepository>,
    read_retries: u32,
}

impl ReportService {
    pub fn new(orders: Arc<dyn OrderRepository>, read_retries: u32) -> Self { Self { orders, read_retries } }

    /// Summarizes history records whose order date falls in `[from, to)`.
    pub async fn sales_report(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<SalesReport> {
        if let (Some(f), Some(t)) = (from, to) {
            if f >= t {
                return Err(OrderingError::validation("from", "must be earlier than 'to'"));
            }
        }
        let records = retry_read(self.read_retries, || self.orders.list_history(from, to)).await?;
        Ok(summarize(from, to, &records))
    }
}

fn summarize(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>, records: &[OrderHistoryRecord]) -> SalesReport {
    let mut daily: BTreeMap<NaiveDate, DailySales> = BTreeMap::new();
    let mut items: HashMap<String, ItemSales> = HashMap::new();
    let mut completed = 0;
    let mut cancelled = 0;
    let mut revenue = Decimal::ZERO;

    for record in records {
        let order = &record.order;
        match order.status() {
            OrderStatus::Completed => {}
            OrderStatus::Cancelled => {
                cancelled += 1;
                continue;
            }
            _ => continue,
        }
        completed += 1;
        revenue = revenue.saturating_add(order.total_amount());

        let date = order.order_date().date_naive();
        let day = daily.entry(date).or_insert(DailySales { date, orders: 0, revenue: Decimal::ZERO });
        day.orders += 1;
        day.revenue = day.revenue.saturating_add(order.total_amount());

        for line in order.items() {
            let key = line.food_id.as_ref().map_or_else(|| format!("name:{}", line.name), |id| format!("id:{id}"));
            let entry = items.entry(key).or_insert_with(|| ItemSales {
                food_id: line.food_id.as_ref().map(|id| id.to_string()),
                name: line.name.clone(),
                quantity: 0,
                revenue: Decimal::ZERO,
            });
            entry.quantity += u64::from(line.quantity);
            entry.revenue = entry.revenue.saturating_add(line.line_total().unwrap_or(Decimal::MAX));
        }
    }

    let mut top_items: Vec<ItemSales> = items.into_values().collect();
    top_items.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    top_items.truncate(TOP_ITEMS);

    let average_order_value = if completed == 0 { Decimal::ZERO } else { (revenue / Decimal::from(completed)).round_dp(2) };

    SalesReport {
        from,
        to,
        completed_orders: completed,
        cancelled_orders: cancelled,
        revenue,
        average_order_value,
        daily: daily.into_values().collect(),
        top_items,
    }
}
