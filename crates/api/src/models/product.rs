//! Catalog products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfloor_core::{Price, ProductId};

/// Maximum number of images a product may carry.
pub const MAX_IMAGES: usize = 3;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub description: String,
    /// Units on hand; never negative.
    pub stock: i32,
    pub category: String,
    /// Public image URLs, at most [`MAX_IMAGES`].
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The first image, used as the order-line thumbnail.
    #[must_use]
    pub fn primary_image(&self) -> String {
        self.images.first().cloned().unwrap_or_default()
    }
}

/// A product to insert.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Price,
    pub description: String,
    pub stock: i32,
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Partial product update; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<Price>,
    pub description: Option<String>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    /// Replaces the full image list when present.
    pub images: Option<Vec<String>>,
}

impl ProductPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.description.is_none()
            && self.stock.is_none()
            && self.category.is_none()
            && self.images.is_none()
    }

    /// Apply the patch to a product in place.
    pub fn apply(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(description) = &self.description {
            product.description.clone_from(description);
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category) = &self.category {
            product.category.clone_from(category);
        }
        if let Some(images) = &self.images {
            product.images.clone_from(images);
        }
    }
}
