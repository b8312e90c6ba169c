//! User domain types.

use clover_market_core::{UserId, Username};

/// A storefront user (domain type).
///
/// The stored credential digest never leaves the database layer; this type
/// carries only the identity.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Sign-in name, unique and case-sensitive.
    pub username: Username,
}
