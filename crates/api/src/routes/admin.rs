//! Admin routes: catalog management, order fulfilment, customers and stats.
//!
//! Every handler takes [`RequireAdmin`], so callers must be signed in with an
//! email on the configured allowlist.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use shopfloor_core::{OrderId, Price, ProductId};

use crate::db::RepositoryError;
use crate::error::{ApiJson, ApiPath, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{AdminOrder, DashboardStats, NewProduct, Order, Product, ProductPatch, User};
use crate::models::product::MAX_IMAGES;
use crate::services::images::{MAX_UPLOAD_BYTES, upload_all};
use crate::services::{ImageHostError, ImageUpload, OrderService};
use crate::state::AppState;

/// Body limit for product uploads: every image at full size plus the text fields.
const PRODUCT_UPLOAD_LIMIT: usize = MAX_IMAGES * MAX_UPLOAD_BYTES + 64 * 1024;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", put(update_product))
        .layer(DefaultBodyLimit::max(PRODUCT_UPLOAD_LIMIT))
        .route("/orders", get(list_orders))
        .route("/orders/{order_id}/status", put(update_order_status))
        .route("/customers", get(list_customers))
        .route("/stats", get(dashboard_stats))
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub message: &'static str,
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub message: &'static str,
    pub order: Order,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Text fields and files from a product multipart form.
///
/// Blank text fields count as absent. Any part with a file name is an image.
#[derive(Debug, Default)]
struct ProductForm {
    name: Option<String>,
    price: Option<Price>,
    description: Option<String>,
    stock: Option<i32>,
    category: Option<String>,
    images: Vec<ImageUpload>,
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if let Some(file_name) = field.file_name().map(str::to_owned) {
                if form.images.len() == MAX_IMAGES {
                    return Err(ImageHostError::Rejected(format!(
                        "A maximum of {MAX_IMAGES} images are allowed"
                    ))
                    .into());
                }
                let content_type = field.content_type().unwrap_or_default().to_owned();
                let data = field.bytes().await?;
                form.images.push(ImageUpload {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                });
                continue;
            }

            let text = field.text().await?;
            let value = text.trim();
            if value.is_empty() {
                continue;
            }
            match name.as_str() {
                "name" => form.name = Some(value.to_owned()),
                "price" => {
                    form.price = Some(
                        value
                            .parse()
                            .map_err(|e| AppError::Validation(format!("Invalid price: {e}")))?,
                    );
                }
                "description" => form.description = Some(value.to_owned()),
                "stock" => form.stock = Some(parse_stock(value)?),
                "category" => form.category = Some(value.to_owned()),
                _ => {}
            }
        }

        Ok(form)
    }
}

fn parse_stock(value: &str) -> Result<i32> {
    match value.parse::<i32>() {
        Ok(stock) if stock >= 0 => Ok(stock),
        _ => Err(AppError::Validation(
            "Stock must be a non-negative whole number".to_string(),
        )),
    }
}

/// `GET /api/admin/products` - all products, newest first.
pub async fn list_products(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.store().list_products().await?))
}

/// `POST /api/admin/products` - create a product with 1 to 3 images.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    let form = ProductForm::read(multipart).await?;

    let (Some(name), Some(price), Some(description), Some(stock), Some(category)) = (
        form.name,
        form.price,
        form.description,
        form.stock,
        form.category,
    ) else {
        return Err(AppError::Validation("All fields are required".to_string()));
    };
    if form.images.is_empty() {
        return Err(AppError::Validation(
            "At least one image is required".to_string(),
        ));
    }

    let images = upload_all(state.images(), form.images).await?;
    let product = state
        .store()
        .create_product(&NewProduct {
            name,
            price,
            description,
            stock,
            category,
            images,
        })
        .await?;

    info!(product_id = %product.id, "Product created");
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            message: "Product created successfully",
            product,
        }),
    ))
}

/// `PUT /api/admin/products/{id}` - update supplied fields; new images
/// replace the old ones.
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    multipart: Multipart,
) -> Result<Json<ProductResponse>> {
    let form = ProductForm::read(multipart).await?;

    // Unknown ids fail before anything is uploaded.
    let Some(existing) = state.store().get_products(&[id]).await?.pop() else {
        return Err(AppError::NotFound("Product not found".to_string()));
    };

    let images = if form.images.is_empty() {
        None
    } else {
        Some(upload_all(state.images(), form.images).await?)
    };

    let patch = ProductPatch {
        name: form.name,
        price: form.price,
        description: form.description,
        stock: form.stock,
        category: form.category,
        images,
    };
    let product = if patch.is_empty() {
        existing
    } else {
        state
            .store()
            .update_product(id, &patch)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AppError::NotFound("Product not found".to_string()),
                e => e.into(),
            })?
    };

    info!("Product updated");
    Ok(Json(ProductResponse {
        message: "Product updated successfully",
        product,
    }))
}

/// `GET /api/admin/orders` - every order with its customer.
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<AdminOrder>>> {
    Ok(Json(state.store().list_all_orders().await?))
}

/// `PUT /api/admin/orders/{order_id}/status`
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(order_id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<OrderResponse>> {
    let order = OrderService::new(state.store())
        .update_status(order_id, &body.status)
        .await?;

    Ok(Json(OrderResponse {
        message: "Order status updated successfully",
        order,
    }))
}

/// `GET /api/admin/customers` - all users, newest first.
pub async fn list_customers(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.store().list_users().await?))
}

/// `GET /api/admin/stats`
pub async fn dashboard_stats(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<DashboardStats>> {
    Ok(Json(state.store().dashboard_stats().await?))
}
