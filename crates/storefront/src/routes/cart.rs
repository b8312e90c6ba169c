//! Cart and checkout route handlers.
//!
//! Cart routes work on the active cart: the anonymous session cart until the
//! visitor signs in, the persisted cart afterwards. Validation runs before
//! anything mutates.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use clover_market_core::{ItemId, OrderId};

use crate::db::inventory::InventoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::CartLine;
use crate::services::cart::{ActiveCart, ShoppingCart};
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub item_id: i64,
    pub quantity: i64,
}

/// Remove from cart request body.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub item_id: i64,
}

/// Cart display data.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total_quantity: i64,
}

impl CartView {
    fn from_lines(lines: Vec<CartLine>) -> Self {
        let total_quantity = lines.iter().map(|line| line.quantity).sum();
        Self {
            lines,
            total_quantity,
        }
    }
}

/// Cart count badge data.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: i64,
}

/// Placed order response.
#[derive(Debug, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
}

/// Display the active cart.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let cart = ActiveCart::for_shopper(&session, user.as_ref(), state.pool());
    let lines = cart.lines().await?;

    Ok(Json(CartView::from_lines(lines)))
}

/// Cart count badge.
#[instrument(skip(state, session, user))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartCount>> {
    let cart = ActiveCart::for_shopper(&session, user.as_ref(), state.pool());
    let count = cart.lines().await?.iter().map(|line| line.quantity).sum();

    Ok(Json(CartCount { count }))
}

/// Add a quantity of an item to the active cart.
///
/// Item existence and quantity validity are checked before anything mutates.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartCount>)> {
    let item_id = ItemId::new(body.item_id);
    let inventory = InventoryRepository::new(state.pool());

    if !inventory.exists(item_id).await? {
        return Err(AppError::NotFound("Item does not exist".to_owned()));
    }
    if !inventory.is_quantity_valid(body.quantity, item_id).await? {
        return Err(AppError::InvalidQuantity(
            "Quantity is invalid for this item".to_owned(),
        ));
    }

    let cart = ActiveCart::for_shopper(&session, user.as_ref(), state.pool());
    cart.add(item_id, body.quantity).await?;

    let count = cart.lines().await?.iter().map(|line| line.quantity).sum();
    Ok((StatusCode::CREATED, Json(CartCount { count })))
}

/// Remove an item's line from the active cart.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    let item_id = ItemId::new(body.item_id);

    if !InventoryRepository::new(state.pool()).exists(item_id).await? {
        return Err(AppError::NotFound("Item does not exist".to_owned()));
    }

    let cart = ActiveCart::for_shopper(&session, user.as_ref(), state.pool());
    if !cart.contains(item_id).await? {
        return Err(AppError::BadRequest("Item is not in cart".to_owned()));
    }

    cart.remove(item_id).await?;

    let lines = cart.lines().await?;
    Ok(Json(CartView::from_lines(lines)))
}

/// Check out the signed-in user's cart.
#[instrument(skip(state))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<(StatusCode, Json<CheckoutReceipt>)> {
    let order_id = CheckoutService::new(state.pool()).checkout(user.id).await?;

    Ok((StatusCode::CREATED, Json(CheckoutReceipt { order_id })))
}
