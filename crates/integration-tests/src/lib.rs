//! Shared harness for Clover Market integration tests.
//!
//! Spawns the real router on a loopback listener against an in-memory
//! database and hands back a cookie-holding HTTP client, so tests drive the
//! storefront the way a browser session would.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::{IpAddr, Ipv4Addr};

use axum::Router;
use secrecy::SecretString;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use clover_market_core::ItemId;
use clover_market_storefront::config::StorefrontConfig;
use clover_market_storefront::state::AppState;
use clover_market_storefront::{db, middleware, routes};

/// A running storefront instance plus a client wired to it.
pub struct TestApp {
    /// Base URL of the spawned server (e.g. `http://127.0.0.1:49152`).
    pub base_url: String,
    /// HTTP client with a cookie store, so sessions persist across requests.
    pub client: reqwest::Client,
    /// Handle on the server's database for direct assertions.
    pub pool: SqlitePool,
}

impl TestApp {
    /// Build a URL under this instance.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Test configuration pointing at an in-memory database.
fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("sqlite::memory:".to_owned()),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://127.0.0.1".to_owned(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// In-memory pool pinned to a single connection so every query sees the same
/// database for the lifetime of the test.
async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::new().in_memory(true).foreign_keys(true);

    SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("in-memory pool")
}

/// Spawn the storefront on an ephemeral port and return a handle to it.
///
/// # Panics
///
/// Panics when the server cannot be assembled; integration tests have no
/// graceful fallback.
pub async fn spawn_app() -> TestApp {
    let pool = memory_pool().await;
    db::ensure_schema(&pool).await.expect("schema");

    let session_store = middleware::session::create_session_store(&pool)
        .await
        .expect("session store");
    let config = test_config();
    let session_layer = middleware::session::create_session_layer(session_store, &config.base_url);

    let state = AppState::new(config, pool.clone());

    let app: Router = Router::new()
        .merge(routes::routes())
        .layer(session_layer)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });

    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("client");

    TestApp {
        base_url: format!("http://{addr}"),
        client,
        pool,
    }
}

/// Insert a catalog item directly, returning its id.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn seed_item(pool: &SqlitePool, name: &str, available: i64) -> ItemId {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO inventory (available, product_name, description) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(available)
    .bind(name)
    .bind("integration test item")
    .fetch_one(pool)
    .await
    .expect("seed item");

    ItemId::new(id)
}
