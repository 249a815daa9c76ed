//! Saved addresses and the wishlist of the signed-in user.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::{Deserialize, Serialize};

use shopfloor_core::{AddressId, ProductId};

use crate::db::RepositoryError;
use crate::error::{ApiJson, ApiPath, AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::{Address, AddressPatch, NewAddress, Product};
use crate::state::AppState;

/// Create the user routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(list_addresses).post(add_address))
        .route(
            "/addresses/{address_id}",
            put(update_address).delete(delete_address),
        )
        .route("/wishlist", get(list_wishlist).post(add_to_wishlist))
        .route("/wishlist/{product_id}", delete(remove_from_wishlist))
}

#[derive(Debug, Serialize)]
pub struct AddressesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Serialize)]
pub struct WishlistResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub wishlist: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

fn address_not_found(e: RepositoryError) -> AppError {
    match e {
        RepositoryError::NotFound => AppError::NotFound("Address not found".to_string()),
        e => e.into(),
    }
}

/// `GET /api/users/addresses`
pub async fn list_addresses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<AddressesResponse>> {
    let addresses = state.store().list_addresses(user.id).await?;
    Ok(Json(AddressesResponse {
        message: None,
        addresses,
    }))
}

/// `POST /api/users/addresses`
pub async fn add_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(address): ApiJson<NewAddress>,
) -> Result<(StatusCode, Json<AddressesResponse>)> {
    let missing = address.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let addresses = state.store().add_address(user.id, &address).await?;
    Ok((
        StatusCode::CREATED,
        Json(AddressesResponse {
            message: Some("Address added successfully"),
            addresses,
        }),
    ))
}

/// `PUT /api/users/addresses/{address_id}`
pub async fn update_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(address_id): ApiPath<AddressId>,
    ApiJson(patch): ApiJson<AddressPatch>,
) -> Result<Json<AddressesResponse>> {
    let addresses = state
        .store()
        .update_address(user.id, address_id, &patch)
        .await
        .map_err(address_not_found)?;
    Ok(Json(AddressesResponse {
        message: Some("Address updated successfully"),
        addresses,
    }))
}

/// `DELETE /api/users/addresses/{address_id}`
pub async fn delete_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(address_id): ApiPath<AddressId>,
) -> Result<Json<AddressesResponse>> {
    let addresses = state
        .store()
        .delete_address(user.id, address_id)
        .await
        .map_err(address_not_found)?;
    Ok(Json(AddressesResponse {
        message: Some("Address deleted successfully"),
        addresses,
    }))
}

/// `GET /api/users/wishlist` - wishlisted products, resolved.
pub async fn list_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<WishlistResponse<Product>>> {
    let wishlist = state.store().wishlist_products(user.id).await?;
    Ok(Json(WishlistResponse {
        message: None,
        wishlist,
    }))
}

/// `POST /api/users/wishlist`
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<WishlistRequest>,
) -> Result<(StatusCode, Json<WishlistResponse<ProductId>>)> {
    let wishlist = state
        .store()
        .add_to_wishlist(user.id, body.product_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Product not found".to_string()),
            RepositoryError::Conflict(_) => {
                AppError::Validation("Product already in wishlist".to_string())
            }
            e => e.into(),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(WishlistResponse {
            message: Some("Product added to wishlist"),
            wishlist,
        }),
    ))
}

/// `DELETE /api/users/wishlist/{product_id}`
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<WishlistResponse<ProductId>>> {
    let wishlist = state
        .store()
        .remove_from_wishlist(user.id, product_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                AppError::NotFound("Product not found in wishlist".to_string())
            }
            e => e.into(),
        })?;

    Ok(Json(WishlistResponse {
        message: Some("Product removed from wishlist"),
        wishlist,
    }))
}
