//! The shopper-facing cart capability.
//!
//! A cart is session-held while the visitor is anonymous and store-backed
//! once they sign in. Both implementations expose the same operations through
//! [`ShoppingCart`]; handlers pick one via [`ActiveCart::for_shopper`] based
//! on the session identity. [`merge_session_cart`] is the one-time transfer
//! that runs at sign-in.

use std::collections::BTreeMap;

use sqlx::SqlitePool;
use thiserror::Error;
use tower_sessions::Session;

use clover_market_core::{ItemId, UserId};

use crate::db::RepositoryError;
use crate::db::carts::CartRepository;
use crate::models::{CartLine, CurrentUser, SessionCart, session_keys};

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The session transport failed to read or write the cart.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Operations every cart supports, independent of where it is stored.
#[allow(async_fn_in_trait)]
pub trait ShoppingCart {
    /// Current lines, ordered by item id.
    async fn lines(&self) -> Result<Vec<CartLine>, CartError>;

    /// Upsert a quantity of one item.
    async fn add(&self, item_id: ItemId, quantity: i64) -> Result<(), CartError>;

    /// Remove one item's line. Removing an absent line is a no-op.
    async fn remove(&self, item_id: ItemId) -> Result<(), CartError>;

    /// Whether the cart holds a line for the item.
    async fn contains(&self, item_id: ItemId) -> Result<bool, CartError>;
}

/// Cart stored in the anonymous visitor's session.
pub struct AnonymousCart<'a> {
    session: &'a Session,
}

impl AnonymousCart<'_> {
    async fn snapshot(&self) -> Result<SessionCart, CartError> {
        Ok(self
            .session
            .get::<SessionCart>(session_keys::SESSION_CART)
            .await?
            .unwrap_or_default())
    }

    async fn store(&self, cart: &SessionCart) -> Result<(), CartError> {
        self.session
            .insert(session_keys::SESSION_CART, cart)
            .await?;
        Ok(())
    }
}

impl ShoppingCart for AnonymousCart<'_> {
    async fn lines(&self) -> Result<Vec<CartLine>, CartError> {
        Ok(self.snapshot().await?.to_cart_lines())
    }

    async fn add(&self, item_id: ItemId, quantity: i64) -> Result<(), CartError> {
        let mut cart = self.snapshot().await?;
        cart.add(item_id, quantity);
        self.store(&cart).await
    }

    async fn remove(&self, item_id: ItemId) -> Result<(), CartError> {
        let mut cart = self.snapshot().await?;
        if cart.remove(item_id) {
            self.store(&cart).await?;
        }
        Ok(())
    }

    async fn contains(&self, item_id: ItemId) -> Result<bool, CartError> {
        Ok(self.snapshot().await?.contains(item_id))
    }
}

/// Cart persisted in the relational store for a signed-in user.
pub struct PersistedCart<'a> {
    carts: CartRepository<'a>,
    user_id: UserId,
}

impl ShoppingCart for PersistedCart<'_> {
    async fn lines(&self) -> Result<Vec<CartLine>, CartError> {
        Ok(self.carts.lines(self.user_id).await?)
    }

    async fn add(&self, item_id: ItemId, quantity: i64) -> Result<(), CartError> {
        let mut lines = BTreeMap::new();
        lines.insert(item_id, quantity);
        Ok(self.carts.add_or_merge(self.user_id, &lines).await?)
    }

    async fn remove(&self, item_id: ItemId) -> Result<(), CartError> {
        Ok(self.carts.remove_item(self.user_id, item_id).await?)
    }

    async fn contains(&self, item_id: ItemId) -> Result<bool, CartError> {
        Ok(self.carts.contains(self.user_id, item_id).await?)
    }
}

/// The active cart for a request, selected by authentication state.
pub enum ActiveCart<'a> {
    /// Anonymous visitor: the cart lives in the session.
    Anonymous(AnonymousCart<'a>),
    /// Signed-in user: the cart lives in the store.
    SignedIn(PersistedCart<'a>),
}

impl<'a> ActiveCart<'a> {
    /// Pick the cart implementation for the current shopper.
    #[must_use]
    pub fn for_shopper(
        session: &'a Session,
        user: Option<&CurrentUser>,
        pool: &'a SqlitePool,
    ) -> Self {
        match user {
            Some(user) => Self::SignedIn(PersistedCart {
                carts: CartRepository::new(pool),
                user_id: user.id,
            }),
            None => Self::Anonymous(AnonymousCart { session }),
        }
    }
}

impl ShoppingCart for ActiveCart<'_> {
    async fn lines(&self) -> Result<Vec<CartLine>, CartError> {
        match self {
            Self::Anonymous(cart) => cart.lines().await,
            Self::SignedIn(cart) => cart.lines().await,
        }
    }

    async fn add(&self, item_id: ItemId, quantity: i64) -> Result<(), CartError> {
        match self {
            Self::Anonymous(cart) => cart.add(item_id, quantity).await,
            Self::SignedIn(cart) => cart.add(item_id, quantity).await,
        }
    }

    async fn remove(&self, item_id: ItemId) -> Result<(), CartError> {
        match self {
            Self::Anonymous(cart) => cart.remove(item_id).await,
            Self::SignedIn(cart) => cart.remove(item_id).await,
        }
    }

    async fn contains(&self, item_id: ItemId) -> Result<bool, CartError> {
        match self {
            Self::Anonymous(cart) => cart.contains(item_id).await,
            Self::SignedIn(cart) => cart.contains(item_id).await,
        }
    }
}

/// Transfer the anonymous session cart into a user's persisted cart.
///
/// Runs once at sign-in: read all session lines, upsert them into the store,
/// then discard the session-side cart. The store write happens before the
/// discard; a failed upsert leaves the session cart in place.
///
/// # Errors
///
/// Returns `CartError::Repository` if the upsert fails and
/// `CartError::Session` if the session transport fails.
pub async fn merge_session_cart(
    pool: &SqlitePool,
    session: &Session,
    user_id: UserId,
) -> Result<(), CartError> {
    let Some(snapshot) = session
        .get::<SessionCart>(session_keys::SESSION_CART)
        .await?
    else {
        return Ok(());
    };

    if !snapshot.is_empty() {
        CartRepository::new(pool)
            .add_or_merge(user_id, snapshot.lines())
            .await?;
        tracing::debug!(%user_id, lines = snapshot.lines().len(), "merged session cart");
    }

    session
        .remove::<SessionCart>(session_keys::SESSION_CART)
        .await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_pool, seed_item, seed_user};

    #[tokio::test]
    async fn test_persisted_cart_round_trip() {
        let pool = memory_pool().await;
        let user_id = seed_user(&pool, "alice").await;
        let lamp = seed_item(&pool, "lamp", 10).await;

        let cart = PersistedCart {
            carts: CartRepository::new(&pool),
            user_id,
        };

        cart.add(lamp, 2).await.unwrap();
        cart.add(lamp, 1).await.unwrap();

        assert!(cart.contains(lamp).await.unwrap());
        assert_eq!(
            cart.lines().await.unwrap(),
            vec![CartLine {
                item_id: lamp,
                quantity: 3
            }]
        );

        cart.remove(lamp).await.unwrap();
        assert!(cart.lines().await.unwrap().is_empty());
    }
}
