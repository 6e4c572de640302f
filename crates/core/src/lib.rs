//! QuickBite Core - Shared types library.
//!
//! This crate provides the domain types used across the QuickBite backend:
//! - `api` - JSON API serving cart, order, and payment endpoints
//! - `cli` - Command-line tools for migrations and operator tasks
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart arithmetic, order totals, and status parsing
//! live here so they can be tested without a running service.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, cart quantities, money helpers, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
