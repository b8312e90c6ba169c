//! Authentication service.
//!
//! Registration and password sign-in for storefront accounts.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::SqlitePool;

use clover_market_core::Username;

use crate::db::RepositoryError;
use crate::db::carts::CartRepository;
use crate::db::users::UserRepository;
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// A well-formed argon2id digest that is never compared for success.
///
/// Sign-in verifies against this when the username is unknown, then discards
/// the result, so the failure path costs the same as a wrong password for a
/// real account and "no such user" is indistinguishable from "wrong password".
const UNKNOWN_USER_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

/// Authentication service.
///
/// Handles account registration and sign-in.
pub struct AuthService<'a> {
    pool: &'a SqlitePool,
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
        }
    }

    /// Register a new account.
    ///
    /// The user row and its 1:1 cart row land together or not at all.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` if the username format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the username is taken.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        // Validate username
        let username = Username::parse(username)?;

        // Validate password
        validate_password(password)?;

        // Hash password
        let hashed_pwd = hash_password(password)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let user_id = UserRepository::create_in(&mut tx, &username, &hashed_pwd)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;
        CartRepository::create_in(&mut tx, user_id).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(User {
            id: user_id,
            username,
        })
    }

    /// Sign in with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a wrong password, an
    /// unknown user, or a malformed username — one error for all three, so
    /// responses carry no user-enumeration signal.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Ok(username) = Username::parse(username) else {
            return Err(AuthError::InvalidCredentials);
        };

        match self.users.password_hash(&username).await? {
            Some((user_id, hash)) => {
                verify_password(password, &hash)?;

                Ok(User {
                    id: user_id,
                    username,
                })
            }
            None => {
                // Burn a verification so this arm takes as long as the other;
                // the outcome is fixed regardless.
                let _ = verify_password(password, UNKNOWN_USER_HASH);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Check whether a username is already registered.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn user_exists(&self, username: &Username) -> Result<bool, AuthError> {
        let exists = self.users.exists(username).await?;
        Ok(exists)
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    #[tokio::test]
    async fn test_register_then_login() {
        let pool = memory_pool().await;
        let auth = AuthService::new(&pool);

        let registered = auth.register("alice", "correct horse").await.unwrap();
        let signed_in = auth.login("alice", "correct horse").await.unwrap();

        assert_eq!(signed_in.id, registered.id);
        assert_eq!(signed_in.username.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_register_creates_the_cart() {
        let pool = memory_pool().await;
        let auth = AuthService::new(&pool);

        let user = auth.register("alice", "correct horse").await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM shopping_carts WHERE id = ?")
            .bind(user.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected_without_side_effects() {
        let pool = memory_pool().await;
        let auth = AuthService::new(&pool);

        auth.register("alice", "correct horse").await.unwrap();
        let err = auth.register("alice", "other password").await.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));

        let users: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 1);
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let pool = memory_pool().await;
        let auth = AuthService::new(&pool);

        auth.register("alice", "correct horse").await.unwrap();

        // Wrong password, unknown user, and malformed username all surface
        // the same error.
        let wrong_pwd = auth.login("alice", "wrong password").await.unwrap_err();
        let unknown = auth.login("mallory", "correct horse").await.unwrap_err();
        let malformed = auth.login("", "correct horse").await.unwrap_err();

        assert!(matches!(wrong_pwd, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(malformed, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let pool = memory_pool().await;
        let auth = AuthService::new(&pool);

        let err = auth.register("alice", "short").await.unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_blank_username() {
        let pool = memory_pool().await;
        let auth = AuthService::new(&pool);

        let err = auth.register("   ", "correct horse").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidUsername(_)));
    }

    #[tokio::test]
    async fn test_stored_digest_is_not_the_password() {
        let pool = memory_pool().await;
        let auth = AuthService::new(&pool);

        auth.register("alice", "correct horse").await.unwrap();

        let digest: String = sqlx::query_scalar("SELECT hashed_pwd FROM users WHERE username = 'alice'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_ne!(digest, "correct horse");
        assert!(digest.starts_with("$argon2id$"));
    }
}
