//! Value Objects for pickup ordering

use chrono::{DateTime, DurationRound, FixedOffset, NaiveTime, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::OrderingError;

/// Stable external identifier of a menu item
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FoodId(String);

impl FoodId {
    pub fn new(value: impl Into<String>) -> Result<Self, OrderingError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(OrderingError::validation("foodID", "must not be empty")); }
        if value.len() > 64 { return Err(OrderingError::validation("foodID", "must be at most 64 characters")); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for FoodId {
    type Error = OrderingError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<FoodId> for String {
    fn from(id: FoodId) -> Self { id.0 }
}

impl fmt::Display for FoodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Human-presentable order number, `ORD-YYMMDD-XXXXXXXX`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

impl OrderNumber {
    /// 40 random bits rendered as 8 Crockford base32 characters after the UTC date.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let bits: u64 = rand::thread_rng().gen::<u64>() & ((1 << 40) - 1);
        let suffix: String = (0..8)
            .rev()
            .map(|i| CROCKFORD[((bits >> (i * 5)) & 0x1f) as usize] as char)
            .collect();
        Self(format!("ORD-{}-{}", now.format("%y%m%d"), suffix))
    }
    pub fn parse(value: &str) -> Self { Self(value.trim().to_uppercase()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Requested pickup slot.
///
/// Accepts an RFC 3339 timestamp, or `HH:MM` meaning that wall-clock time today in the
/// restaurant's offset. A slot earlier than the reference instant is rejected; the
/// reference is truncated to the minute so that "now" is always a valid slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PickupTime(DateTime<Utc>);

impl PickupTime {
    pub fn parse(raw: &str, reference: DateTime<Utc>, offset: FixedOffset) -> Result<Self, OrderingError> {
        let raw = raw.trim();
        if raw.is_empty() { return Err(OrderingError::InvalidPickupTime("pickup time is required".into())); }
        let at = match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(_) => {
                let time = NaiveTime::parse_from_str(raw, "%H:%M")
                    .map_err(|_| OrderingError::InvalidPickupTime(format!("unrecognised pickup time '{raw}'")))?;
                let local_day = reference.with_timezone(&offset).date_naive();
                offset
                    .from_local_datetime(&local_day.and_time(time))
                    .single()
                    .ok_or_else(|| OrderingError::InvalidPickupTime(format!("ambiguous pickup time '{raw}'")))?
                    .with_timezone(&Utc)
            }
        };
        let floor = reference.duration_trunc(chrono::Duration::minutes(1)).unwrap_or(reference);
        if at < floor {
            return Err(OrderingError::InvalidPickupTime(format!("pickup time {} is in the past", at.to_rfc3339())));
        }
        Ok(Self(at))
    }
    pub fn at(&self) -> DateTime<Utc> { self.0 }
}
