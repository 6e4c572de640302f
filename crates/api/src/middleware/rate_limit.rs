//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Only order placement is limited: each placement creates a database row and
//! a Stripe checkout session.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::error::AppError;

/// Key extractor that prefers proxy headers and falls back to the socket peer.
///
/// Header order: `CF-Connecting-IP`, first `X-Forwarded-For` entry,
/// `X-Real-IP`.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"]
            .into_iter()
            .find_map(|name| header_ip(req, name))
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, Body>;

/// Answer limiter rejections with the API's JSON error envelope.
fn limiter_error_response(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { headers, .. } => {
            let mut response = AppError::RateLimited.into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::Internal("unable to determine client address".to_string()).into_response()
        }
        GovernorError::Other { msg, .. } => {
            AppError::Internal(msg.unwrap_or_else(|| "rate limiter failure".to_string()))
                .into_response()
        }
    }
}

/// Create rate limiter for order placement: ~12 orders per minute per IP.
///
/// Configuration: 1 request every 5 seconds (replenish), burst of 3.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers (`per_second(5)` and `burst_size(3)`), which are always accepted
/// by `GovernorConfigBuilder`.
#[must_use]
pub fn order_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(5)
        .burst_size(3)
        .finish()
        .expect("rate limiter config with per_second(5) and burst_size(3) is valid");
    GovernorLayer::new(Arc::new(config)).error_handler(limiter_error_response)
}
