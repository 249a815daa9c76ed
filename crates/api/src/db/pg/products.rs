//! Product catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use shopfloor_core::ProductId;

use super::{PgStore, price_from_db};
use crate::db::{ProductStore, RepositoryError};
use crate::models::{NewProduct, Product, ProductPatch};

pub(super) const PRODUCT_COLUMNS: &str =
    "id, name, price, description, stock, category, images, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(super) struct ProductRow {
    id: ProductId,
    name: String,
    price: Decimal,
    description: String,
    stock: i32,
    category: String,
    images: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            price: price_from_db(row.price, "product price")?,
            description: row.description,
            stock: row.stock,
            category: row.category,
            images: row.images,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&ids)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO products (name, price, description, stock, category, images)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.name)
            .bind(product.price)
            .bind(&product.description)
            .bind(product.stock)
            .bind(&product.category)
            .bind(&product.images)
            .fetch_one(self.pool())
            .await?;

        Product::try_from(row)
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            UPDATE products
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                description = COALESCE($4, description),
                stock = COALESCE($5, stock),
                category = COALESCE($6, category),
                images = COALESCE($7, images),
                updated_at = now()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(patch.name.as_deref())
            .bind(patch.price)
            .bind(patch.description.as_deref())
            .bind(patch.stock)
            .bind(patch.category.as_deref())
            .bind(patch.images.as_deref())
            .fetch_optional(self.pool())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Product::try_from(row)
    }
}
