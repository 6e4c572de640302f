//! Core types for QuickBite.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod money;
pub mod order;
pub mod status;

pub use cart::CartData;
pub use id::*;
pub use money::{MINOR_UNIT_SCALE, MoneyError, fits_minor_units, to_minor_units};
pub use order::{OrderItem, OrderTotals, ValidationError};
pub use status::*;
