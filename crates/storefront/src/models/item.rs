//! Inventory item domain type.

use serde::Serialize;

use clover_market_core::ItemId;

/// A catalog item with its current stock level.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Item {
    /// Unique item ID.
    pub id: ItemId,
    /// Units currently available for sale. Never negative.
    pub available: i64,
    /// Display name.
    pub product_name: String,
    /// Display description.
    pub description: String,
}
