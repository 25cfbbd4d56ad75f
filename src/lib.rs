//! Pickup Ordering Service
//!
//! Cart, checkout and order handling for a single restaurant taking
//! pickup orders.
//!
//! ## Features
//! - Guest and signed-in carts with merge on sign-in
//! - Server-side pricing (service fee, tiered discounts)
//! - Pay-at-pickup orders and two-phase card checkout via Stripe
//! - Staff order lifecycle with archival
//! - Menu catalog and sales reporting

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod payments;
pub mod services;
pub mod store;

pub use error::{OrderingError, Result};
