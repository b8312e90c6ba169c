//! Checkout orchestration.
//!
//! Turns a user's persisted cart into an order: decrement stock, record the
//! order, clear the cart. The mutating steps share one transaction; there is
//! no partial checkout.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::instrument;

use clover_market_core::{OrderId, UserId};

use crate::db::RepositoryError;
use crate::db::carts::CartRepository;
use crate::db::inventory::InventoryRepository;
use crate::db::orders::OrderRepository;

/// Errors that can occur during a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines; nothing to check out. No side effects.
    #[error("nothing to check out")]
    EmptyCart,

    /// A concurrent sale left too little stock for some line. The whole
    /// checkout was rolled back and the cart is untouched.
    #[error("insufficient stock to complete the purchase")]
    OutOfStock,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Checkout orchestrator over the inventory, cart, and order stores.
pub struct CheckoutService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Check out the user's cart.
    ///
    /// Load, guard, decrement, record, clear. Everything after the guard
    /// commits as one unit: any failure rolls the whole sequence back, so the
    /// user never ends up with a cleared cart but no order, or decremented
    /// stock but no order. A rejected checkout is safe to retry manually; it
    /// is never retried here.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] when there is nothing to buy and
    /// [`CheckoutError::OutOfStock`] when stock no longer covers a line.
    #[instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<OrderId, CheckoutError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let lines = CartRepository::lines_in(&mut tx, user_id).await?;
        if lines.is_empty() {
            // Dropping the transaction uncommitted leaves no trace.
            return Err(CheckoutError::EmptyCart);
        }

        InventoryRepository::decrement_in(&mut tx, &lines)
            .await
            .map_err(|e| match e {
                RepositoryError::Constraint(_) => CheckoutError::OutOfStock,
                other => CheckoutError::Repository(other),
            })?;
        let order_id = OrderRepository::place_order_in(&mut tx, user_id, &lines).await?;
        CartRepository::clear_in(&mut tx, user_id).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(%user_id, %order_id, lines = lines.len(), "checkout complete");
        Ok(order_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::db::test_support::{memory_pool, seed_item, seed_user};
    use crate::models::CartLine;

    use clover_market_core::ItemId;

    async fn fill_cart(pool: &SqlitePool, user: UserId, item: ItemId, quantity: i64) {
        let mut lines = BTreeMap::new();
        lines.insert(item, quantity);
        CartRepository::new(pool)
            .add_or_merge(user, &lines)
            .await
            .unwrap();
    }

    async fn available(pool: &SqlitePool, item: ItemId) -> i64 {
        InventoryRepository::new(pool)
            .get(item)
            .await
            .unwrap()
            .unwrap()
            .available
    }

    async fn order_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT count(*) FROM orders")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_is_a_noop() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "alice").await;
        seed_item(&pool, "lamp", 10).await;

        let err = CheckoutService::new(&pool).checkout(user).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));

        assert_eq!(order_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_checkout_decrements_records_and_clears() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "alice").await;
        let lamp = seed_item(&pool, "lamp", 10).await;
        fill_cart(&pool, user, lamp, 1).await;

        let order_id = CheckoutService::new(&pool).checkout(user).await.unwrap();

        assert_eq!(available(&pool, lamp).await, 9);

        let history = OrderRepository::new(&pool).history(user).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].order_id, order_id);
        assert_eq!(history[0].item_id, lamp);
        assert_eq!(history[0].quantity, 1);

        assert!(CartRepository::new(&pool).lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_rolls_back_wholesale_when_stock_ran_out() {
        let pool = memory_pool().await;
        let user = seed_user(&pool, "alice").await;
        let lamp = seed_item(&pool, "lamp", 10).await;
        fill_cart(&pool, user, lamp, 2).await;

        // A concurrent sale takes the stock down under the cart's quantity
        // between add-to-cart and checkout.
        sqlx::query("UPDATE inventory SET available = 1 WHERE id = ?")
            .bind(lamp)
            .execute(&pool)
            .await
            .unwrap();

        let err = CheckoutService::new(&pool).checkout(user).await.unwrap_err();
        assert!(matches!(err, CheckoutError::OutOfStock));

        // Nothing moved: stock, orders, and the cart are exactly as before.
        assert_eq!(available(&pool, lamp).await, 1);
        assert_eq!(order_count(&pool).await, 0);
        assert_eq!(
            CartRepository::new(&pool).lines(user).await.unwrap(),
            vec![CartLine {
                item_id: lamp,
                quantity: 2
            }]
        );
    }

    #[tokio::test]
    async fn test_two_checkouts_for_the_last_unit_cannot_both_succeed() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let lamp = seed_item(&pool, "lamp", 1).await;
        fill_cart(&pool, alice, lamp, 1).await;
        fill_cart(&pool, bob, lamp, 1).await;

        let service = CheckoutService::new(&pool);
        let first = service.checkout(alice).await;
        let second = service.checkout(bob).await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(CheckoutError::OutOfStock)));
        assert_eq!(available(&pool, lamp).await, 0);
        assert_eq!(order_count(&pool).await, 1);

        // The losing cart is intact and may retry once stock returns.
        assert_eq!(
            CartRepository::new(&pool).lines(bob).await.unwrap().len(),
            1
        );
    }
}
