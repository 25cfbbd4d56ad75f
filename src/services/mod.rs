//! Application services: one per component, each a thin async layer over the
//! repositories that owns validation and side effects.

pub mod carts;
pub mod checkout;
pub mod lifecycle;
pub mod menu;
pub mod orders;
pub mod reports;

pub use carts::CartService;
pub use checkout::{CheckoutLineInput, CheckoutService, ConfirmOutcome, PaymentRequest};
pub use lifecycle::{LifecycleService, StatusUpdate};
pub use menu::MenuService;
pub use orders::{OrderAssembler, OrderRequest};
pub use reports::{ReportService, SalesReport};

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

const RETRY_BASE_DELAY_MS: u64 = 100;

/// Runs an idempotent read, retrying up to `retries` more times on upstream failures.
pub(crate) async fn retry_read<T, F, Fut>(retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                tracing::warn!(attempt, error = %e, "Retrying read after upstream failure");
                tokio::time::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS << attempt)).await;
            }
            other => return other,
        }
    }
}
