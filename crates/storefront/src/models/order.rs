//! Order domain types.

use chrono::NaiveDate;
use serde::Serialize;

use clover_market_core::{ItemId, OrderId};

/// One row of a user's purchase history: an order line joined with its order.
///
/// The history query returns one of these per order line; grouping lines by
/// `order_id` for presentation is the caller's job.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderHistoryLine {
    /// The order this line belongs to.
    pub order_id: OrderId,
    /// Date the order was placed.
    pub purchase_date: NaiveDate,
    /// The purchased item.
    pub item_id: ItemId,
    /// Units purchased. Always positive.
    pub quantity: i64,
}
