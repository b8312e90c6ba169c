//! Session-related types.
//!
//! Types stored in the session for authentication state and the anonymous
//! cart.

use serde::{Deserialize, Serialize};

use clover_market_core::{UserId, Username};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's sign-in name.
    pub username: Username,
}

/// Session keys for authentication and cart data.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous session cart.
    pub const SESSION_CART: &str = "cart";
}
