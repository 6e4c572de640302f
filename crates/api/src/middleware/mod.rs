//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, one hub per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (frontend origin only)
//! 5. Rate limiting on order placement (governor)
//!
//! Authentication is done per handler through the extractors in [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{RequireAdmin, RequireUser};
pub use rate_limit::order_rate_limiter;
pub use request_id::request_id_middleware;
