//! Inventory repository.
//!
//! Catalog items and their available stock. The `available >= 0` CHECK in the
//! schema is the enforcement point for stock: no operation here may drive it
//! negative, and a statement that would is rejected wholesale.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use clover_market_core::ItemId;

use super::RepositoryError;
use crate::models::{CartLine, Item};

/// Repository for inventory database operations.
pub struct InventoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InventoryRepository<'a> {
    /// Create a new inventory repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Check whether an item exists in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, item_id: ItemId) -> Result<bool, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM inventory WHERE id = ?")
            .bind(item_id)
            .fetch_one(self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Check whether `quantity` units of an item can be requested.
    ///
    /// True iff `0 < quantity <= available`. Fails closed: an unknown item is
    /// never a valid target.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_quantity_valid(
        &self,
        quantity: i64,
        item_id: ItemId,
    ) -> Result<bool, RepositoryError> {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT available FROM inventory WHERE id = ?")
                .bind(item_id)
                .fetch_optional(self.pool)
                .await?;

        Ok(available.is_some_and(|available| quantity > 0 && quantity <= available))
    }

    /// List the whole catalog for display.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Item>, RepositoryError> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT id, available, product_name, description FROM inventory ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// Fetch a single item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, item_id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let item = sqlx::query_as::<_, Item>(
            "SELECT id, available, product_name, description FROM inventory WHERE id = ?",
        )
        .bind(item_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(item)
    }

    /// Add an item to the catalog (stocking path, also used by tests).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Constraint` if `available` is negative.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        product_name: &str,
        description: &str,
        available: i64,
    ) -> Result<ItemId, RepositoryError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO inventory (available, product_name, description) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(available)
        .bind(product_name)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_check_violation()
            {
                return RepositoryError::Constraint("available must be non-negative".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(ItemId::new(id))
    }

    /// Subtract sold quantities from stock, in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::decrement_in`].
    pub async fn decrement(&self, lines: &[CartLine]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::decrement_in(&mut tx, lines).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Subtract sold quantities from stock on an existing connection.
    ///
    /// One batched statement covers all lines. The `available >= 0` CHECK
    /// rejects the whole statement if any line would drive stock negative, so
    /// a racing sale can never be partially applied.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Constraint` if stock cannot cover a line.
    /// Returns `RepositoryError::NotFound` if a line references a missing item.
    /// Returns `RepositoryError::Database` for other database errors.
    pub(crate) async fn decrement_in(
        conn: &mut SqliteConnection,
        lines: &[CartLine],
    ) -> Result<(), RepositoryError> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("WITH sold (item_id, quantity) AS (");
        builder.push_values(lines, |mut row, line| {
            row.push_bind(line.item_id);
            row.push_bind(line.quantity);
        });
        builder.push(
            ") UPDATE inventory \
             SET available = available - (SELECT quantity FROM sold WHERE sold.item_id = inventory.id) \
             WHERE inventory.id IN (SELECT item_id FROM sold)",
        );

        let result = builder.build().execute(&mut *conn).await.map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_check_violation()
            {
                return RepositoryError::Constraint("stock cannot go below zero".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        // Fewer updated rows than lines means a line referenced a missing item.
        if result.rows_affected() != lines.len() as u64 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
