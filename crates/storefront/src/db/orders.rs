//! Order repository.
//!
//! Orders are written once at checkout and never edited or deleted
//! afterwards; the history query is the only read path.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use clover_market_core::{OrderId, UserId};

use super::RepositoryError;
use crate::models::{CartLine, OrderHistoryLine};

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an order with its lines, in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::place_order_in`].
    pub async fn place_order(
        &self,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<OrderId, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order_id = Self::place_order_in(&mut tx, user_id, lines).await?;
        tx.commit().await?;
        Ok(order_id)
    }

    /// Record an order on an existing connection.
    ///
    /// Inserts the `orders` row (stamped with the current date by the table
    /// default) and one batched INSERT for all order lines, returning the
    /// generated order id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Constraint` if `lines` is empty; an order
    /// carries at least one line.
    /// Returns `RepositoryError::Database` for other database errors.
    pub(crate) async fn place_order_in(
        conn: &mut SqliteConnection,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<OrderId, RepositoryError> {
        if lines.is_empty() {
            return Err(RepositoryError::Constraint(
                "an order carries at least one line".to_owned(),
            ));
        }

        let order_id: i64 = sqlx::query_scalar("INSERT INTO orders (user_id) VALUES (?) RETURNING id")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("INSERT INTO order_items (order_id, item_id, quantity) ");
        builder.push_values(lines, |mut row, line| {
            row.push_bind(order_id);
            row.push_bind(line.item_id);
            row.push_bind(line.quantity);
        });
        builder.build().execute(&mut *conn).await?;

        Ok(OrderId::new(order_id))
    }

    /// Purchase history for a user, one row per order line.
    ///
    /// Rows come back ordered by order id then item id; grouping them by
    /// order for presentation is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<OrderHistoryLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderHistoryLine>(
            "SELECT
                orders.id AS order_id,
                orders.purchase_date,
                order_items.item_id,
                order_items.quantity
             FROM orders
             JOIN order_items ON orders.id = order_items.order_id
             WHERE orders.user_id = ?
             ORDER BY orders.id, order_items.item_id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
