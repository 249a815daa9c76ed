//! Product reviews.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};
use tracing::info;

use shopfloor_core::{OrderId, OrderStatus, ProductId};

use crate::db::RepositoryError;
use crate::error::{ApiJson, AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::review::{MAX_RATING, MIN_RATING};
use crate::models::{NewReview, Review};
use crate::services::OrderError;
use crate::state::AppState;

/// Create the review routes router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(create_review))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub message: &'static str,
    pub review: Review,
}

/// `POST /api/reviews` - rate a product from one of the caller's delivered
/// orders. One review per (order, product).
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<ReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>)> {
    if !(MIN_RATING..=MAX_RATING).contains(&body.rating) {
        return Err(AppError::Validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }

    // Other users' orders are reported as missing.
    let order = state
        .store()
        .get_order(body.order_id)
        .await?
        .filter(|order| order.external_id == user.external_id)
        .ok_or(OrderError::OrderNotFound(body.order_id))?;

    if order.status != OrderStatus::Delivered {
        return Err(AppError::Validation(
            "Only delivered orders can be reviewed".to_string(),
        ));
    }
    if !order.contains_product(body.product_id) {
        return Err(AppError::Validation(
            "Product is not part of this order".to_string(),
        ));
    }

    let review = state
        .store()
        .create_review(&NewReview {
            order_id: order.id,
            product_id: body.product_id,
            user_id: user.id,
            rating: body.rating,
            comment: body.comment.trim().to_owned(),
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                AppError::Conflict("Product already reviewed for this order".to_string())
            }
            e => e.into(),
        })?;

    info!(review_id = %review.id, order_id = %order.id, "Review created");
    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            message: "Review submitted successfully",
            review,
        }),
    ))
}
