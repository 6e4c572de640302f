//! Per-user cart quantities.
//!
//! A cart is a plain map from menu item to quantity, stored as a JSON object
//! on the user record (`{"<item id>": <quantity>}`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::ItemId;

/// Item quantities in a user's cart.
///
/// Entries never hold a zero quantity: removing the last unit of an item
/// drops the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartData(BTreeMap<ItemId, u32>);

impl CartData {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add one unit of `item`, returning the new quantity.
    pub fn add(&mut self, item: &ItemId) -> u32 {
        let quantity = self.0.entry(item.clone()).or_insert(0);
        *quantity = quantity.saturating_add(1);
        *quantity
    }

    /// Remove one unit of `item`, returning the remaining quantity.
    ///
    /// Removing an item that is not in the cart is a no-op.
    pub fn remove(&mut self, item: &ItemId) -> u32 {
        let Some(quantity) = self.0.get_mut(item) else {
            return 0;
        };

        *quantity = quantity.saturating_sub(1);
        let remaining = *quantity;
        if remaining == 0 {
            self.0.remove(item);
        }
        remaining
    }

    /// Quantity of `item` currently in the cart.
    #[must_use]
    pub fn quantity(&self, item: &ItemId) -> u32 {
        self.0.get(item).copied().unwrap_or(0)
    }

    /// Total number of units across all items.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.0.values().map(|&q| u64::from(q)).sum()
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Iterate over `(item, quantity)` pairs in item order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, u32)> {
        self.0.iter().map(|(item, &q)| (item, q))
    }

    /// Drop entries with a zero quantity.
    ///
    /// Carts written by older clients may contain `0` entries; they are
    /// normalised away when a cart is loaded.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.0.retain(|_, q| *q > 0);
        self
    }
}
