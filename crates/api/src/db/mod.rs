//! Storage for users, products, orders and reviews.
//!
//! The API talks to storage through the [`Store`] trait so the same handlers
//! run against either backend:
//!
//! - [`PgStore`] - `PostgreSQL`, used in production
//! - [`MemoryStore`] - process-local maps, used in development and tests
//!
//! # Tables
//!
//! - `users` - customers, keyed by the identity provider's subject id
//! - `addresses` - saved addresses, at most one default per user
//! - `wishlist_items` - (user, product) pairs
//! - `products` - catalog with the stock counter
//! - `orders` / `order_items` - placed orders with line snapshots
//! - `reviews` - one per (order, product)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p shopfloor-cli -- migrate
//! ```

pub mod memory;
pub mod pg;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use shopfloor_core::{AddressId, ExternalUserId, OrderId, OrderStatus, ProductId, UserId};

use crate::models::{
    Address, AddressPatch, AdminOrder, CustomerOrder, DashboardStats, NewAddress, NewProduct,
    NewReview, Order, OrderDraft, OrderLineDraft, Product, ProductPatch, Review, User, UserProfile,
};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Why an order could not be placed.
///
/// Any of these means nothing was written: no order row and no stock change.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// A line names a product that does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The combined quantity for a product exceeds its stock at write time.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlacementError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Users, their addresses and wishlists.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by identity-provider subject id.
    async fn find_user_by_external_id(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Option<User>, RepositoryError>;

    /// Insert or refresh a user keyed by `profile.external_id`.
    ///
    /// Returns `Conflict` if the email belongs to a different user.
    async fn upsert_user(&self, profile: &UserProfile) -> Result<User, RepositoryError>;

    /// Delete a user and everything they own except orders.
    ///
    /// Returns whether a user was removed; absence is not an error.
    async fn delete_user_by_external_id(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<bool, RepositoryError>;

    /// All users, newest first.
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;

    /// The user's addresses in insertion order.
    async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError>;

    /// Add an address, clearing other defaults if it is the default.
    /// Returns the full list afterwards.
    async fn add_address(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Vec<Address>, RepositoryError>;

    /// Patch an address, clearing other defaults if it becomes the default.
    /// Returns `NotFound` if the user has no such address.
    async fn update_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
        patch: &AddressPatch,
    ) -> Result<Vec<Address>, RepositoryError>;

    /// Remove an address. Returns `NotFound` if the user has no such address.
    async fn delete_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<Vec<Address>, RepositoryError>;

    /// Wishlisted products that still exist, in the order they were added.
    async fn wishlist_products(&self, user_id: UserId) -> Result<Vec<Product>, RepositoryError>;

    /// Wishlist a product. Returns `Conflict` if already present and
    /// `NotFound` if the product does not exist.
    async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<ProductId>, RepositoryError>;

    /// Remove a product from the wishlist. Returns `NotFound` if absent.
    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<ProductId>, RepositoryError>;
}

/// The product catalog.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// The products with the given ids; missing ids are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    /// Returns `NotFound` if the product does not exist.
    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError>;
}

/// Orders and the stock they consume.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist `draft` and decrement stock for every line, all or nothing.
    ///
    /// Quantities for the same product are summed and each product is
    /// decremented only if its stock covers the sum at write time. Products
    /// are processed in ascending id order.
    async fn place_order(&self, draft: &OrderDraft) -> Result<Order, PlacementError>;

    /// Orders carrying `external_id`, newest first, with the review flag.
    async fn list_orders_for(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Vec<CustomerOrder>, RepositoryError>;

    /// Every order, newest first, with the customer's name and email.
    async fn list_all_orders(&self) -> Result<Vec<AdminOrder>, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Set the status, stamping `shipped_at`/`delivered_at` on first entry.
    /// Returns `NotFound` if the order does not exist.
    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;
}

/// Reviews of delivered orders.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Returns `Conflict` if the (order, product) pair is already reviewed.
    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError>;
}

/// Everything the API needs from storage.
#[async_trait]
pub trait Store: UserStore + ProductStore + OrderStore + ReviewStore {
    /// Aggregates for the admin dashboard.
    async fn dashboard_stats(&self) -> Result<DashboardStats, RepositoryError>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(e)
}

/// Total quantity requested per product, keyed in ascending id order.
pub(crate) fn combined_demand(lines: &[OrderLineDraft]) -> BTreeMap<ProductId, i32> {
    let mut demand = BTreeMap::new();
    for line in lines {
        let total: &mut i32 = demand.entry(line.product_id).or_default();
        *total = total.saturating_add(line.quantity.get());
    }
    demand
}
