//! Services the route handlers orchestrate.
//!
//! # Services
//!
//! - `auth` - HS256 bearer token verification (and issuing, for operators)
//! - `payments` - Stripe Checkout sessions
//! - `checkout` - Order placement and payment reconciliation

pub mod auth;
pub mod checkout;
pub mod payments;
