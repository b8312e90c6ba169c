//! User repository for database operations.

use sqlx::{SqliteConnection, SqlitePool};

use clover_market_core::{UserId, Username};

use super::RepositoryError;

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Check whether the username is taken.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, username: &Username) -> Result<bool, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Insert a new user row, returning the generated id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &Username,
        hashed_pwd: &str,
    ) -> Result<UserId, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::create_in(&mut conn, username, hashed_pwd).await
    }

    /// Insert a new user row on an existing connection.
    ///
    /// # Errors
    ///
    /// See [`Self::create`].
    pub(crate) async fn create_in(
        conn: &mut SqliteConnection,
        username: &Username,
        hashed_pwd: &str,
    ) -> Result<UserId, RepositoryError> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO users (username, hashed_pwd) VALUES (?, ?) RETURNING id")
                .bind(username)
                .bind(hashed_pwd)
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.is_unique_violation()
                    {
                        return RepositoryError::Conflict("username already exists".to_owned());
                    }
                    RepositoryError::Database(e)
                })?;

        Ok(UserId::new(id))
    }

    /// Look up a user's id by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn id_of(&self, username: &Username) -> Result<Option<UserId>, RepositoryError> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool)
            .await?;

        Ok(id.map(UserId::new))
    }

    /// Stored credential digest for a username, if the user exists.
    ///
    /// Returns the user id alongside the digest so a successful verification
    /// needs no second lookup.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn password_hash(
        &self,
        username: &Username,
    ) -> Result<Option<(UserId, String)>, RepositoryError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, hashed_pwd FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|(id, hash)| (UserId::new(id), hash)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::test_support::memory_pool;
    use super::*;

    fn username(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);
        let alice = username("alice");

        assert!(!repo.exists(&alice).await.unwrap());
        assert!(repo.id_of(&alice).await.unwrap().is_none());

        let id = repo.create(&alice, "digest").await.unwrap();

        assert!(repo.exists(&alice).await.unwrap());
        assert_eq!(repo.id_of(&alice).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts_and_inserts_nothing() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);
        let alice = username("alice");

        repo.create(&alice, "digest").await.unwrap();
        let err = repo.create(&alice, "other-digest").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_usernames_are_case_sensitive() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);

        repo.create(&username("alice"), "digest").await.unwrap();

        // Different case is a different account
        assert!(!repo.exists(&username("Alice")).await.unwrap());
        repo.create(&username("Alice"), "digest").await.unwrap();
    }

    #[tokio::test]
    async fn test_password_hash_lookup() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);
        let alice = username("alice");

        assert!(repo.password_hash(&alice).await.unwrap().is_none());

        let id = repo.create(&alice, "digest").await.unwrap();
        let (found_id, hash) = repo.password_hash(&alice).await.unwrap().unwrap();
        assert_eq!(found_id, id);
        assert_eq!(hash, "digest");
    }
}
