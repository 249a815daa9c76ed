//! Reviews.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shopfloor_core::{OrderId, ProductId, ReviewId, UserId};

use super::PgStore;
use crate::db::{RepositoryError, ReviewStore, conflict_on_unique};
use crate::models::{NewReview, Review};

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    order_id: OrderId,
    product_id: ProductId,
    user_id: UserId,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            INSERT INTO reviews (order_id, product_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, product_id, user_id, rating, comment, created_at
            ",
        )
        .bind(review.order_id)
        .bind(review.product_id)
        .bind(review.user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .fetch_one(self.pool())
        .await
        .map_err(|e| conflict_on_unique(e, "product already reviewed for this order"))?;

        Ok(row.into())
    }
}
