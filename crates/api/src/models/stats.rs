//! Dashboard aggregates.

use serde::Serialize;

use shopfloor_core::Price;

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_orders: i64,
    /// Sum of `total_price` over all orders.
    pub total_revenue: Price,
    pub total_products: i64,
    pub total_customers: i64,
}
