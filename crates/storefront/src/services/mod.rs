//! Business logic services composing the repositories.

pub mod auth;
pub mod cart;
pub mod checkout;
