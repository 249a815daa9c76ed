//! Product reviews tied to delivered orders.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shopfloor_core::{OrderId, ProductId, ReviewId, UserId};

/// Lowest accepted rating.
pub const MIN_RATING: i16 = 1;
/// Highest accepted rating.
pub const MAX_RATING: i16 = 5;

/// A stored review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A review to insert. One per (order, product).
#[derive(Debug, Clone)]
pub struct NewReview {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: i16,
    pub comment: String,
}
