//! Integration tests for Shopfloor.
//!
//! # Running Tests
//!
//! ```bash
//! export SHOPFLOOR_DATABASE_URL=postgres://localhost/shopfloor_test
//! cargo test -p shopfloor-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `store_postgres` - `PgStore` against a real database: stock
//!   reservation under concurrency, rollback, default addresses, status
//!   timestamps and user deletion
//! - `api_smoke` - HTTP requests against a running `shopfloor-api` server
//!
//! Everything here is `#[ignore]`d so `cargo test` stays hermetic.
