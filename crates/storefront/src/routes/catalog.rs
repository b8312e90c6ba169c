//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use clover_market_core::ItemId;

use crate::db::inventory::InventoryRepository;
use crate::error::{AppError, Result};
use crate::models::Item;
use crate::state::AppState;

/// List the full catalog.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Item>>> {
    let items = InventoryRepository::new(state.pool()).list_all().await?;
    Ok(Json(items))
}

/// Fetch a single item.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Item>> {
    let item = InventoryRepository::new(state.pool())
        .get(ItemId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Item does not exist".to_owned()))?;

    Ok(Json(item))
}
