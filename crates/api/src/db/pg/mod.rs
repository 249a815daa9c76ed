//! `PostgreSQL` [`Store`] backend.
//!
//! Queries are checked at runtime (`query_as` into `FromRow` row types) and
//! the rows are converted into validated domain types here, so corrupt data
//! surfaces as [`RepositoryError::DataCorruption`] instead of reaching a
//! handler.

mod orders;
mod products;
mod reviews;
mod users;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use shopfloor_core::Price;

use super::{RepositoryError, Store};
use crate::models::DashboardStats;

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn price_from_db(amount: Decimal, column: &str) -> Result<Price, RepositoryError> {
    Price::new(amount)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column} in database: {e}")))
}

#[async_trait]
impl Store for PgStore {
    async fn dashboard_stats(&self) -> Result<DashboardStats, RepositoryError> {
        let (total_orders, revenue, total_products, total_customers) =
            sqlx::query_as::<_, (i64, Decimal, i64, i64)>(
                r"
                SELECT
                    (SELECT count(*) FROM orders),
                    (SELECT COALESCE(sum(total_price), 0) FROM orders),
                    (SELECT count(*) FROM products),
                    (SELECT count(*) FROM users)
                ",
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardStats {
            total_orders,
            total_revenue: price_from_db(revenue, "revenue")?,
            total_products,
            total_customers,
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
