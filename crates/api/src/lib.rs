//! QuickBite ordering API.
//!
//! Carts, order placement with Stripe hosted checkout, payment verification,
//! and order administration, served as JSON over axum. The binary in
//! `main.rs` wires configuration, tracing and Sentry around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::middleware::auth::{ADMIN_TOKEN_HEADER, TOKEN_HEADER};
use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::state::AppState;

/// CORS policy allowing the configured frontend origin.
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origin = config.frontend_origin();
    let allow_origin = HeaderValue::from_str(&origin).map_or_else(
        |e| {
            tracing::warn!(origin = %origin, error = %e, "Frontend origin is not a valid header; CORS disabled");
            AllowOrigin::list([])
        },
        AllowOrigin::exact,
    );

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(TOKEN_HEADER),
            HeaderName::from_static(ADMIN_TOKEN_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(60 * 60))
}

/// Build the full application router with its middleware stack.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config());

    Router::new()
        .merge(routes::routes())
        .layer(cors)
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
