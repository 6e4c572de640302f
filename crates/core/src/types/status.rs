//! Status enums for orders and payments.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a status string is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid order status: {0}")]
pub struct InvalidStatus(pub String);

/// Order lifecycle status.
///
/// A placed order starts `pending`, becomes `confirmed` or `cancelled` once
/// the payment is reconciled, and is then moved along by staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "quickbite.order_status", rename_all = "kebab-case")
)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::OutForDelivery => "out-for-delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the order has reached the end of its lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| InvalidStatus(s.to_owned()))
    }
}

/// Payment state of a hosted checkout session, as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Funds captured.
    Paid,
    /// Session not (yet) paid, or abandoned.
    Unpaid,
    /// Session completed without needing a charge.
    NoPaymentRequired,
    /// Any value this service does not know about.
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Only a `paid` session confirms an order.
    #[must_use]
    pub const fn confirms_order(self) -> bool {
        matches!(self, Self::Paid)
    }
}
