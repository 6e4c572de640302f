//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Database readiness check
//!
//! # Cart (customer token)
//! POST /api/cart/add           - Add one unit of an item
//! POST /api/cart/remove        - Remove one unit of an item
//! POST /api/cart/get           - Current cart (GET also accepted)
//!
//! # Orders
//! POST /api/order/place        - Place order, open checkout session (customer, rate limited)
//! POST /api/order/verify       - Reconcile payment after the Stripe redirect
//! POST /api/order/userorders   - Caller's orders (customer; GET also accepted)
//! GET  /api/order/list         - All orders, optional ?status= (admin)
//! POST /api/order/status       - Change an order's status (admin)
//! ```

pub mod cart;
pub mod order;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::middleware::order_rate_limiter;
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/add", post(cart::add))
        .route("/remove", post(cart::remove))
        .route("/get", post(cart::get).get(cart::get))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/place",
            post(order::place).route_layer(order_rate_limiter()),
        )
        .route("/verify", post(order::verify))
        .route(
            "/userorders",
            post(order::user_orders).get(order::user_orders),
        )
        .route("/list", get(order::list))
        .route("/status", post(order::update_status))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/cart", cart_routes())
        .nest("/api/order", order_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
