//! Database operations for the storefront `SQLite` store.
//!
//! # Tables
//!
//! - `users` - Site authentication
//! - `inventory` - Catalog items and available stock
//! - `shopping_carts` / `cart_items` - Persisted per-user carts
//! - `orders` / `order_items` - Purchase history
//! - `tower_sessions` - Session storage (owned by the session store)
//!
//! # Schema
//!
//! The schema is created idempotently at process startup via
//! [`ensure_schema`]: missing tables are created, existing tables are left
//! untouched. There are no migrations.
//!
//! # Queries
//!
//! All queries are runtime-checked (`sqlx::query` and friends) so the crate
//! builds without a provisioned database. Multi-row writes are batched into
//! single statements with `QueryBuilder` rather than issued per row.

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

pub mod carts;
pub mod inventory;
pub mod orders;
pub mod schema;
pub mod users;

pub use schema::ensure_schema;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying database failure (connection lost, malformed query).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness rule was violated (duplicate username, duplicate cart line).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A data constraint was violated mid-statement (e.g. stock below zero).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The referenced row does not exist.
    #[error("not found")]
    NotFound,
}

/// Create a `SQLite` connection pool with sensible defaults.
///
/// Foreign keys are enforced on every connection; the referential rules in
/// the schema are part of the contract, not advisory.
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url.expose_secret())?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}
