//! Cart repository.
//!
//! Persisted cart line items for signed-in users, keyed by user id (carts are
//! 1:1 with users, so the cart id *is* the user id). The anonymous session
//! cart lives in the session transport, not here; see `services::cart` for
//! the merge-on-sign-in transfer.

use std::collections::BTreeMap;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use clover_market_core::{ItemId, UserId};

use super::RepositoryError;
use crate::models::CartLine;

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Establish the cart row for a newly registered user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a cart.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::create_in(&mut conn, user_id).await
    }

    /// Establish the cart row on an existing connection.
    ///
    /// # Errors
    ///
    /// See [`Self::create`].
    pub(crate) async fn create_in(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO shopping_carts (id) VALUES (?)")
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("cart already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        Ok(())
    }

    /// Cart lines for a user, ordered by item id.
    ///
    /// An empty cart is an empty vec; there is no row-level empty marker.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::lines_in(&mut conn, user_id).await
    }

    /// Cart lines for a user on an existing connection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub(crate) async fn lines_in(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, CartLine>(
            "SELECT item_id, quantity FROM cart_items WHERE cart_id = ? ORDER BY item_id",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Upsert a batch of lines into a user's cart.
    ///
    /// Existing (cart, item) rows have their quantity incremented; new items
    /// are inserted. The incoming keys are partitioned into those two sets and
    /// applied as one batched UPDATE plus one batched INSERT inside a single
    /// transaction. The `UNIQUE (cart_id, item_id)` index keeps concurrent
    /// calls from ever producing duplicate rows for the same pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a concurrent insert won the
    /// (cart, item) key; the whole batch is rolled back.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn add_or_merge(
        &self,
        user_id: UserId,
        lines: &BTreeMap<ItemId, i64>,
    ) -> Result<(), RepositoryError> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let existing: Vec<ItemId> =
            sqlx::query_scalar("SELECT item_id FROM cart_items WHERE cart_id = ?")
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;

        let (to_update, to_insert): (Vec<_>, Vec<_>) = lines
            .iter()
            .map(|(&item_id, &quantity)| (item_id, quantity))
            .partition(|(item_id, _)| existing.contains(item_id));

        if !to_update.is_empty() {
            let mut builder: QueryBuilder<'_, Sqlite> =
                QueryBuilder::new("WITH incoming (item_id, quantity) AS (");
            builder.push_values(to_update.iter().copied(), |mut row, (item_id, quantity)| {
                row.push_bind(item_id);
                row.push_bind(quantity);
            });
            builder.push(
                ") UPDATE cart_items \
                 SET quantity = quantity + (SELECT quantity FROM incoming WHERE incoming.item_id = cart_items.item_id) \
                 WHERE cart_id = ",
            );
            builder.push_bind(user_id);
            builder.push(" AND item_id IN (SELECT item_id FROM incoming)");

            builder.build().execute(&mut *tx).await?;
        }

        if !to_insert.is_empty() {
            let mut builder: QueryBuilder<'_, Sqlite> =
                QueryBuilder::new("INSERT INTO cart_items (cart_id, item_id, quantity) ");
            builder.push_values(to_insert.iter().copied(), |mut row, (item_id, quantity)| {
                row.push_bind(user_id);
                row.push_bind(item_id);
                row.push_bind(quantity);
            });

            builder.build().execute(&mut *tx).await.map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("cart line already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove one line. Idempotent: removing an absent line is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = ? AND item_id = ?")
            .bind(user_id)
            .bind(item_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Whether the user's cart holds a line for the item.
    ///
    /// Defined as `count > 0`, not as cursor truthiness.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn contains(&self, user_id: UserId, item_id: ItemId) -> Result<bool, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM cart_items WHERE cart_id = ? AND item_id = ?")
                .bind(user_id)
                .bind(item_id)
                .fetch_one(self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Remove every line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::clear_in(&mut conn, user_id).await
    }

    /// Remove every line from the user's cart on an existing connection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub(crate) async fn clear_in(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::test_support::{memory_pool, seed_item, seed_user};
    use super::*;

    fn one_line(item_id: ItemId, quantity: i64) -> BTreeMap<ItemId, i64> {
        let mut lines = BTreeMap::new();
        lines.insert(item_id, quantity);
        lines
    }

    #[tokio::test]
    async fn test_add_or_merge_upserts_instead_of_duplicating() {
        let pool = memory_pool().await;
        let repo = CartRepository::new(&pool);
        let user = seed_user(&pool, "alice").await;
        let lamp = seed_item(&pool, "lamp", 10).await;

        repo.add_or_merge(user, &one_line(lamp, 2)).await.unwrap();
        repo.add_or_merge(user, &one_line(lamp, 3)).await.unwrap();

        // One row with the summed quantity, not two rows
        let lines = repo.lines(user).await.unwrap();
        assert_eq!(
            lines,
            vec![CartLine {
                item_id: lamp,
                quantity: 5
            }]
        );
    }

    #[tokio::test]
    async fn test_add_or_merge_partitions_existing_and_new_keys() {
        let pool = memory_pool().await;
        let repo = CartRepository::new(&pool);
        let user = seed_user(&pool, "alice").await;
        let lamp = seed_item(&pool, "lamp", 10).await;
        let mug = seed_item(&pool, "mug", 10).await;

        repo.add_or_merge(user, &one_line(lamp, 1)).await.unwrap();

        // Second batch touches one existing key and one new key
        let mut batch = BTreeMap::new();
        batch.insert(lamp, 2);
        batch.insert(mug, 4);
        repo.add_or_merge(user, &batch).await.unwrap();

        let lines = repo.lines(user).await.unwrap();
        assert_eq!(
            lines,
            vec![
                CartLine {
                    item_id: lamp,
                    quantity: 3
                },
                CartLine {
                    item_id: mug,
                    quantity: 4
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_round_trip_create_add_get_clear() {
        let pool = memory_pool().await;
        let repo = CartRepository::new(&pool);
        let user = seed_user(&pool, "alice").await;
        let lamp = seed_item(&pool, "lamp", 10).await;

        repo.add_or_merge(user, &one_line(lamp, 2)).await.unwrap();
        assert_eq!(
            repo.lines(user).await.unwrap(),
            vec![CartLine {
                item_id: lamp,
                quantity: 2
            }]
        );

        repo.clear(user).await.unwrap();
        assert!(repo.lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_contains() {
        let pool = memory_pool().await;
        let repo = CartRepository::new(&pool);
        let user = seed_user(&pool, "alice").await;
        let lamp = seed_item(&pool, "lamp", 10).await;
        let mug = seed_item(&pool, "mug", 10).await;

        repo.add_or_merge(user, &one_line(lamp, 1)).await.unwrap();

        assert!(repo.contains(user, lamp).await.unwrap());
        assert!(!repo.contains(user, mug).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_item_is_idempotent() {
        let pool = memory_pool().await;
        let repo = CartRepository::new(&pool);
        let user = seed_user(&pool, "alice").await;
        let lamp = seed_item(&pool, "lamp", 10).await;

        repo.add_or_merge(user, &one_line(lamp, 1)).await.unwrap();
        repo.remove_item(user, lamp).await.unwrap();
        // Absent line: still Ok
        repo.remove_item(user, lamp).await.unwrap();

        assert!(repo.lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let pool = memory_pool().await;
        let repo = CartRepository::new(&pool);
        let user = seed_user(&pool, "alice").await;

        // seed_user created the cart; a second create is a conflict
        let err = repo.create(user).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_carts_are_isolated_per_user() {
        let pool = memory_pool().await;
        let repo = CartRepository::new(&pool);
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let lamp = seed_item(&pool, "lamp", 10).await;

        repo.add_or_merge(alice, &one_line(lamp, 2)).await.unwrap();

        assert!(repo.lines(bob).await.unwrap().is_empty());
        repo.clear(bob).await.unwrap();
        assert_eq!(repo.lines(alice).await.unwrap().len(), 1);
    }
}
