//! HTTP surface under `/api/v1`.

mod cart;
mod checkout;
pub mod error;
pub mod identity;
mod menu;
mod orders;
mod reports;

use axum::error_handling::HandleErrorLayer;
use axum::extract::{FromRequest, FromRequestParts};
use axum::routing::{get, patch, post, put};
use axum::{BoxError, Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use identity::Caller;

use crate::config::Config;
use crate::error::OrderingError;
use crate::events::EventPublisher;
use crate::payments::PaymentGateway;
use crate::services::{CartService, CheckoutService, LifecycleService, MenuService, OrderAssembler, ReportService};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub carts: CartService,
    pub orders: OrderAssembler,
    pub checkout: CheckoutService,
    pub lifecycle: LifecycleService,
    pub menu: MenuService,
    pub reports: ReportService,
}

impl AppState {
    pub fn new<S: Store + 'static>(store: Arc<S>, gateway: Arc<dyn PaymentGateway>, events: EventPublisher, config: &Config) -> Self {
        let retries = config.read_retries;
        let orders = OrderAssembler::new(store.clone(), store.clone(), events.clone(), config.restaurant_offset);
        Self {
            carts: CartService::new(store.clone(), store.clone(), retries),
            checkout: CheckoutService::new(gateway, orders.clone(), store.clone(), store.clone(), config),
            lifecycle: LifecycleService::new(store.clone(), events, config.auto_archive_terminal, retries),
            menu: MenuService::new(store.clone(), retries),
            reports: ReportService::new(store, retries),
            orders,
        }
    }
}

/// JSON body whose rejections render as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejections render as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "pickup-orders"})) }))
        .route("/cart", get(cart::get_cart).put(cart::save_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/:food_id", patch(cart::update_item).delete(cart::remove_item))
        .route("/cart/merge", post(cart::merge_carts))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/mine", get(orders::my_orders))
        .route("/orders/history", get(orders::order_history))
        .route("/orders/:order_number", patch(orders::update_status).delete(orders::delete_order))
        .route("/orders/:order_number/archive", post(orders::archive_order))
        .route("/checkout-session", post(checkout::create_session))
        .route("/checkout-session/:session_id", get(checkout::confirm_session))
        .route("/menu", get(menu::list_menu).post(menu::create_item))
        .route("/menu/:food_id", put(menu::upsert_item).delete(menu::delete_item))
        .route("/reports/sales", get(reports::sales_report));

    Router::new()
        .nest("/api/v1", api)
        .layer(ServiceBuilder::new().layer(HandleErrorLayer::new(request_timed_out)).timeout(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A request that outlives the router timeout is reported as a retryable upstream failure.
async fn request_timed_out(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::from(OrderingError::UpstreamUnavailable("request timed out".into()))
    } else {
        ApiError::from(OrderingError::Storage(format!("unhandled middleware error: {err}")))
    }
}
