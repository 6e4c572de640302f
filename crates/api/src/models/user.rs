//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quickbite_core::{CartData, UserId};

/// A customer record (domain type).
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Items currently in the cart.
    pub cart: CartData,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Identity established from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
}
