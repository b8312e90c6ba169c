//! Idempotent schema creation.
//!
//! Run once at process startup: missing tables are created, existing tables
//! are left untouched. Table and column names are part of the contract the
//! rest of the application (and any admin tooling) relies on.

use sqlx::SqlitePool;

/// Table definitions, applied in dependency order.
const TABLES: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        hashed_pwd TEXT NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS inventory (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        available INTEGER NOT NULL CHECK (available >= 0),
        product_name TEXT NOT NULL,
        description TEXT NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        purchase_date TEXT NOT NULL DEFAULT CURRENT_DATE,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE
    )",
    r"
    CREATE TABLE IF NOT EXISTS order_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES inventory (id) ON DELETE CASCADE,
        quantity INTEGER NOT NULL CHECK (quantity > 0)
    )",
    r"
    CREATE TABLE IF NOT EXISTS shopping_carts (
        id INTEGER PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE
    )",
    r"
    CREATE TABLE IF NOT EXISTS cart_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cart_id INTEGER NOT NULL REFERENCES shopping_carts (id) ON DELETE CASCADE,
        item_id INTEGER NOT NULL REFERENCES inventory (id) ON DELETE CASCADE,
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        UNIQUE (cart_id, item_id)
    )",
];

/// Create any missing tables.
///
/// # Errors
///
/// Returns `sqlx::Error` if a statement fails.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::memory_pool;
    use super::*;

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let pool = memory_pool().await;

        // memory_pool already ran it once; a second run must not touch
        // existing tables or fail.
        ensure_schema(&pool).await.expect("second run");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .expect("table list");

        for expected in [
            "cart_items",
            "inventory",
            "order_items",
            "orders",
            "shopping_carts",
            "users",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }
}
