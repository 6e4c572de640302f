//! Domain models for the API.
//!
//! These types are separate from database row types; repositories convert
//! rows into them after validating stored JSON.

pub mod order;
pub mod user;

pub use order::Order;
pub use user::{CurrentUser, User};
