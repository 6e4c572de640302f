//! Order line items and totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::money::fits_minor_units;

/// Display name used for line items that arrive without one.
pub const FALLBACK_ITEM_NAME: &str = "Item";

/// Validation failures for an order request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The order has no line items.
    #[error("no items provided")]
    NoItems,

    /// A line item has an unusable price or quantity.
    #[error("invalid item at position {index}: {reason}")]
    InvalidItem { index: usize, reason: &'static str },

    /// A computed amount overflowed.
    #[error("order total out of range")]
    Overflow,
}

/// A line item as submitted by the client and stored on the order.
///
/// Prices are trusted from the client; the menu lives outside this service.
/// Extra fields (image, description, ...) are kept so the stored order
/// echoes what the customer saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Menu item id, if the client sent one.
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unit price in major currency units.
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    /// Number of units.
    pub quantity: u32,
    /// Any other fields the client attached.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OrderItem {
    /// Create a line item without extra fields.
    #[must_use]
    pub fn new(name: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            price,
            quantity,
            extra: serde_json::Map::new(),
        }
    }

    /// Read line items from raw JSON values.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidItem` for the first value that is not
    /// a line item (missing price, negative or fractional quantity, ...).
    pub fn from_json_list(values: Vec<serde_json::Value>) -> Result<Vec<Self>, ValidationError> {
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                serde_json::from_value(value).map_err(|_| ValidationError::InvalidItem {
                    index,
                    reason: "price or quantity is not a valid number",
                })
            })
            .collect()
    }

    /// Name shown on the checkout page.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(FALLBACK_ITEM_NAME)
    }

    /// `price × quantity`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Computed amounts for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    /// Sum of all line totals.
    pub items_total: Decimal,
    /// Flat delivery charge.
    pub delivery_fee: Decimal,
    /// `items_total + delivery_fee`; what the customer is charged.
    pub amount: Decimal,
}

impl OrderTotals {
    /// Validate line items and compute the order amount.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NoItems` for an empty order,
    /// `ValidationError::InvalidItem` for a zero quantity, a negative price or
    /// a price finer than one minor unit, and `ValidationError::Overflow` if the sum does not fit a `Decimal`.
    pub fn compute(items: &[OrderItem], delivery_fee: Decimal) -> Result<Self, ValidationError> {
        if items.is_empty() {
            return Err(ValidationError::NoItems);
        }

        let mut items_total = Decimal::ZERO;
        for (index, item) in items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(ValidationError::InvalidItem {
                    index,
                    reason: "quantity must be at least 1",
                });
            }
            if item.price.is_sign_negative() && !item.price.is_zero() {
                return Err(ValidationError::InvalidItem {
                    index,
                    reason: "price must not be negative",
                });
            }
            if !fits_minor_units(item.price) {
                return Err(ValidationError::InvalidItem {
                    index,
                    reason: "price has more than two decimal places",
                });
            }

            let line = item.line_total().ok_or(ValidationError::Overflow)?;
            items_total = items_total
                .checked_add(line)
                .ok_or(ValidationError::Overflow)?;
        }

        let amount = items_total
            .checked_add(delivery_fee)
            .ok_or(ValidationError::Overflow)?;

        Ok(Self {
            items_total,
            delivery_fee,
            amount,
        })
    }
}
