//! Cart pricing.
//!
//! Totals are always derived from the lines at the moment of the call and never stored.
//! The service fee and the discount are each rounded half-up to a whole currency unit
//! before they are combined.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::domain::aggregates::CartLine;
use crate::error::OrderingError;

/// Subtotal at which the service fee is waived and the top discount tier starts.
const FEE_WAIVER_THRESHOLD: i64 = 50_000;

/// `(minimum subtotal, rate in percent)`, highest tier first.
const DISCOUNT_TIERS: [(i64, i64); 3] = [(50_000, 10), (25_000, 5), (10_000, 2)];

const SERVICE_FEE_PERCENT: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub service_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

pub fn compute_totals(lines: &[CartLine]) -> Result<PriceBreakdown, OrderingError> {
    let mut subtotal = Decimal::ZERO;
    for line in lines {
        if line.unit_price < Decimal::ZERO {
            return Err(OrderingError::InvalidLine { food_id: line.food_id.to_string(), reason: "unit price is negative" });
        }
        if line.quantity < 1 {
            return Err(OrderingError::InvalidLine { food_id: line.food_id.to_string(), reason: "quantity must be at least 1" });
        }
        subtotal = line
            .line_total()
            .and_then(|total| subtotal.checked_add(total))
            .ok_or_else(|| OrderingError::InvalidLine { food_id: line.food_id.to_string(), reason: "line total is out of range" })?;
    }

    let out_of_range = || OrderingError::InvalidProducts(format!("cart subtotal {subtotal} is out of range"));
    let service_fee = service_fee(subtotal).ok_or_else(out_of_range)?;
    let discount = discount(subtotal).ok_or_else(out_of_range)?;
    let total = subtotal.checked_add(service_fee).and_then(|t| t.checked_sub(discount)).ok_or_else(out_of_range)?;
    debug_assert!(total >= Decimal::ZERO, "discount {discount} exceeds subtotal {subtotal} plus fee {service_fee}");

    Ok(PriceBreakdown { subtotal, service_fee, discount, total })
}

/// `None` when the subtotal is too large to take a percentage of.
pub fn service_fee(subtotal: Decimal) -> Option<Decimal> {
    if subtotal >= Decimal::from(FEE_WAIVER_THRESHOLD) { return Some(Decimal::ZERO); }
    percent_of(subtotal, SERVICE_FEE_PERCENT)
}

pub fn discount(subtotal: Decimal) -> Option<Decimal> {
    match DISCOUNT_TIERS.iter().find(|(min, _)| subtotal >= Decimal::from(*min)) {
        Some((_, rate)) => percent_of(subtotal, *rate),
        None => Some(Decimal::ZERO),
    }
}

/// Half-up to a whole currency unit.
pub fn round_unit(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn percent_of(amount: Decimal, percent: i64) -> Option<Decimal> {
    amount.checked_mul(Decimal::from(percent))?.checked_div(Decimal::ONE_HUNDRED).map(round_unit)
}
