//! Shopfloor API library.
//!
//! The REST back office for a single-store shop: catalog management, order
//! placement with stock reservation, customer addresses and wishlists,
//! reviews, and user sync from the identity provider. Exposed as a library
//! so the binary, the CLI and the integration tests share one router and one
//! storage layer.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
