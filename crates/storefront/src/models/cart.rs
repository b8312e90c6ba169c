//! Cart domain types.
//!
//! [`CartLine`] is one (item, quantity) pairing; it is the shape both cart
//! backends speak. [`SessionCart`] is the transient cart held in the
//! visitor's session while they are anonymous; the persisted counterpart
//! lives in `cart_items` rows (see `db::carts`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use clover_market_core::ItemId;

/// One (item, quantity) pairing within a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    /// The item this line references.
    pub item_id: ItemId,
    /// Units requested. Always positive.
    pub quantity: i64,
}

/// Cart held in the visitor's session while they are anonymous.
///
/// Has no identity beyond the session: it is merged into the user's persisted
/// cart at sign-in and discarded, or dies with the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCart {
    lines: BTreeMap<ItemId, i64>,
}

impl SessionCart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a quantity of an item, merging with any existing line.
    pub fn add(&mut self, item_id: ItemId, quantity: i64) {
        *self.lines.entry(item_id).or_insert(0) += quantity;
    }

    /// Remove an item's line. Returns `true` if the line was present.
    pub fn remove(&mut self, item_id: ItemId) -> bool {
        self.lines.remove(&item_id).is_some()
    }

    /// Whether the cart holds a line for the item.
    #[must_use]
    pub fn contains(&self, item_id: ItemId) -> bool {
        self.lines.contains_key(&item_id)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> i64 {
        self.lines.values().sum()
    }

    /// The lines as a map, keyed by item.
    #[must_use]
    pub const fn lines(&self) -> &BTreeMap<ItemId, i64> {
        &self.lines
    }

    /// The lines in the shape the stores speak.
    #[must_use]
    pub fn to_cart_lines(&self) -> Vec<CartLine> {
        self.lines
            .iter()
            .map(|(&item_id, &quantity)| CartLine { item_id, quantity })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_merges_quantities() {
        let mut cart = SessionCart::new();
        cart.add(ItemId::new(1), 2);
        cart.add(ItemId::new(1), 3);

        // One line, not two
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines().get(&ItemId::new(1)), Some(&5));
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_remove() {
        let mut cart = SessionCart::new();
        cart.add(ItemId::new(1), 2);

        assert!(cart.remove(ItemId::new(1)));
        assert!(!cart.remove(ItemId::new(1)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_contains() {
        let mut cart = SessionCart::new();
        cart.add(ItemId::new(4), 1);

        assert!(cart.contains(ItemId::new(4)));
        assert!(!cart.contains(ItemId::new(5)));
    }

    #[test]
    fn test_to_cart_lines() {
        let mut cart = SessionCart::new();
        cart.add(ItemId::new(2), 1);
        cart.add(ItemId::new(1), 4);

        let lines = cart.to_cart_lines();
        assert_eq!(
            lines,
            vec![
                CartLine {
                    item_id: ItemId::new(1),
                    quantity: 4
                },
                CartLine {
                    item_id: ItemId::new(2),
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        // Session storage serializes the cart to JSON; item ids become
        // string map keys on the wire and must come back intact.
        let mut cart = SessionCart::new();
        cart.add(ItemId::new(7), 2);
        cart.add(ItemId::new(9), 1);

        let json = serde_json::to_string(&cart).unwrap();
        let parsed: SessionCart = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cart);
    }
}
