//! Customer order routes.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::error::{ApiJson, Result};
use crate::middleware::CurrentUser;
use crate::models::{CustomerOrder, Order};
use crate::services::{OrderService, PlaceOrderRequest};
use crate::state::AppState;

/// Create the order routes router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_orders).post(place_order))
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<CustomerOrder>,
}

/// `POST /api/orders` - place an order for the caller.
///
/// Either every line is reserved and one order is created, or nothing is
/// written.
pub async fn place_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = OrderService::new(state.store())
        .place_order(&user, request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/orders` - the caller's orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<OrdersResponse>> {
    let orders = OrderService::new(state.store()).orders_for(&user).await?;
    Ok(Json(OrdersResponse { orders }))
}
