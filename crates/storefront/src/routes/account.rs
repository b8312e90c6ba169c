//! Account route handlers.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::instrument;

use clover_market_core::OrderId;

use crate::db::orders::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::CartLine;
use crate::state::AppState;

/// One past order with its lines.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub purchase_date: NaiveDate,
    pub lines: Vec<CartLine>,
}

/// Order history for the signed-in user, grouped by order id.
#[instrument(skip(state))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderView>>> {
    let rows = OrderRepository::new(state.pool()).history(user.id).await?;

    // Group line rows by order for presentation.
    let mut grouped: BTreeMap<OrderId, OrderView> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.order_id)
            .or_insert_with(|| OrderView {
                order_id: row.order_id,
                purchase_date: row.purchase_date,
                lines: Vec::new(),
            })
            .lines
            .push(CartLine {
                item_id: row.item_id,
                quantity: row.quantity,
            });
    }

    Ok(Json(grouped.into_values().collect()))
}
