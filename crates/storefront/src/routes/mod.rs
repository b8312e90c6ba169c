//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check (in main.rs)
//! GET  /health/ready           - Readiness check (in main.rs)
//!
//! # Catalog
//! GET  /items                  - Full catalog
//! GET  /items/{id}             - Single item
//!
//! # Cart (anonymous session cart or persisted cart, by sign-in state)
//! GET  /cart                   - Cart contents
//! GET  /cart/count             - Total quantity badge
//! POST /cart/add               - Add a quantity of an item
//! POST /cart/remove            - Remove an item's line
//!
//! # Checkout (requires auth)
//! POST /checkout               - Atomic checkout of the persisted cart
//!
//! # Auth
//! POST /auth/register          - Create account (and its cart)
//! POST /auth/login             - Sign in; merges the session cart
//! POST /auth/logout            - Sign out
//!
//! # Account (requires auth)
//! GET  /account/orders         - Order history, grouped by order
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/{id}", get(catalog::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/remove", post(cart::remove))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new().route("/orders", get(account::orders))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Catalog routes
        .nest("/items", catalog_routes())
        // Cart routes
        .nest("/cart", cart_routes())
        // Checkout
        .route("/checkout", post(cart::checkout))
        // Auth routes
        .nest("/auth", auth_routes())
        // Account routes
        .nest("/account", account_routes())
}
