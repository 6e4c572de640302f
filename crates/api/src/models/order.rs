//! Order domain type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use quickbite_core::{OrderId, OrderItem, OrderStatus, UserId};

/// A placed order as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    /// Total charged, delivery included.
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    /// Delivery address exactly as submitted.
    pub address: serde_json::Value,
    /// Whether the processor reported the checkout session as paid.
    pub payment: bool,
    pub status: OrderStatus,
    /// Checkout session id, once a session was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
