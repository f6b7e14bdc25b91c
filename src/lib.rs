//! Shopfront
//!
//! Shopfront is the cart and promotion core of an online store: it decides
//! which cart lines a promotion covers, prices percentage, fixed and
//! buy-X-get-Y discounts, and reconciles stored carts against the live
//! catalog.

pub mod cart;
pub mod config;
pub mod discounts;
pub mod fixtures;
pub mod ids;
pub mod money;
pub mod observability;
pub mod prelude;
pub mod products;
pub mod promotions;
pub mod reconciliation;
pub mod service;
pub mod store;
