//! Compact order manifest stored in the processor's session metadata.
//!
//! Metadata is a flat bag of short strings (at most 50 keys, 500 characters per value),
//! so the item list is serialized with one-letter keys and split across `items_0..items_k`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::aggregates::{Customer, OrderLine};
use crate::domain::value_objects::FoodId;
use crate::error::{OrderingError, Result};

const MAX_VALUE_CHARS: usize = 500;
const MAX_ITEM_CHUNKS: usize = 40;

const KEY_CHUNKS: &str = "items_n";
const KEY_PICKUP: &str = "pickup";
const KEY_INITIATED: &str = "ts";
const KEY_UID: &str = "uid";
const KEY_NAME: &str = "name";
const KEY_EMAIL: &str = "email";
const KEY_PHONE: &str = "phone";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestLine {
    #[serde(rename = "f", default, skip_serializing_if = "Option::is_none")]
    pub food_id: Option<String>,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "q")]
    pub quantity: u32,
    #[serde(rename = "p")]
    pub price: Decimal,
}

impl ManifestLine {
    pub fn to_order_line(&self) -> OrderLine {
        OrderLine {
            food_id: self.food_id.clone().and_then(|id| FoodId::new(id).ok()),
            name: self.name.clone(),
            unit_price: self.price,
            quantity: self.quantity,
            category: String::new(),
            image: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionManifest {
    pub lines: Vec<ManifestLine>,
    pub pickup_time: String,
    pub customer: Customer,
    pub initiated_at: DateTime<Utc>,
}

impl SessionManifest {
    pub fn to_metadata(&self) -> Result<BTreeMap<String, String>> {
        let items = serde_json::to_string(&self.lines).map_err(|e| OrderingError::InvalidProducts(e.to_string()))?;
        let chars: Vec<char> = items.chars().collect();
        let chunks: Vec<String> = chars.chunks(MAX_VALUE_CHARS).map(|c| c.iter().collect()).collect();
        if chunks.len() > MAX_ITEM_CHUNKS {
            return Err(OrderingError::InvalidProducts(format!("too many items for one payment session ({} characters)", chars.len())));
        }

        let mut metadata = BTreeMap::new();
        metadata.insert(KEY_CHUNKS.to_string(), chunks.len().to_string());
        for (i, chunk) in chunks.into_iter().enumerate() {
            metadata.insert(format!("items_{i}"), chunk);
        }
        metadata.insert(KEY_PICKUP.to_string(), truncate(&self.pickup_time));
        metadata.insert(KEY_INITIATED.to_string(), self.initiated_at.to_rfc3339());
        if let Some(uid) = &self.customer.identity_id {
            metadata.insert(KEY_UID.to_string(), truncate(uid));
        }
        metadata.insert(KEY_NAME.to_string(), truncate(&self.customer.name));
        metadata.insert(KEY_EMAIL.to_string(), truncate(&self.customer.email));
        metadata.insert(KEY_PHONE.to_string(), truncate(&self.customer.phone));
        Ok(metadata)
    }

    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Result<Self> {
        let count: usize = metadata
            .get(KEY_CHUNKS)
            .ok_or_else(|| corrupt("missing item manifest"))?
            .parse()
            .map_err(|_| corrupt("bad item chunk count"))?;
        if count > MAX_ITEM_CHUNKS {
            return Err(corrupt("bad item chunk count"));
        }
        let mut items = String::new();
        for i in 0..count {
            items.push_str(metadata.get(&format!("items_{i}")).ok_or_else(|| corrupt(&format!("missing items_{i}")))?);
        }
        let lines: Vec<ManifestLine> = if items.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&items).map_err(|e| corrupt(&format!("item manifest: {e}")))?
        };
        if let Some(bad) = lines.iter().find(|l| l.quantity == 0 || l.price < Decimal::ZERO || l.name.is_empty()) {
            return Err(corrupt(&format!("invalid manifest line '{}'", bad.name)));
        }

        let initiated_at = metadata
            .get(KEY_INITIATED)
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .ok_or_else(|| corrupt("missing initiation timestamp"))?;
        let get = |key: &str| metadata.get(key).cloned().unwrap_or_default();

        Ok(Self {
            lines,
            pickup_time: metadata.get(KEY_PICKUP).cloned().ok_or_else(|| corrupt("missing pickup time"))?,
            customer: Customer { identity_id: metadata.get(KEY_UID).cloned(), name: get(KEY_NAME), email: get(KEY_EMAIL), phone: get(KEY_PHONE) },
            initiated_at,
        })
    }
}

fn truncate(value: &str) -> String { value.chars().take(MAX_VALUE_CHARS).collect() }

fn corrupt(reason: &str) -> OrderingError { OrderingError::CorruptSessionData(reason.to_string()) }
