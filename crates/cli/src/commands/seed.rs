//! Seed the catalog from a YAML file.
//!
//! The file is a list of products:
//!
//! ```yaml
//! - name: Desk Lamp
//!   price: "24.50"
//!   description: Warm light for late nights
//!   stock: 12
//!   category: Lighting
//!   images:
//!     - https://res.cloudinary.com/demo/image/upload/products/lamp.png
//! ```
//!
//! Image URLs are stored as given; nothing is uploaded.

use std::path::Path;

use tracing::{error, info};

use shopfloor_api::db::{self, PgStore, ProductStore};
use shopfloor_api::models::NewProduct;
use shopfloor_api::models::product::MAX_IMAGES;

/// Problems with one product entry; empty when the entry is usable.
fn validate(product: &NewProduct) -> Vec<String> {
    let mut problems = Vec::new();
    if product.name.trim().is_empty() {
        problems.push("name is empty".to_owned());
    }
    if product.category.trim().is_empty() {
        problems.push("category is empty".to_owned());
    }
    if product.stock < 0 {
        problems.push(format!("stock is negative ({})", product.stock));
    }
    if product.images.len() > MAX_IMAGES {
        problems.push(format!(
            "{} images (at most {MAX_IMAGES} allowed)",
            product.images.len()
        ));
    }
    problems
}

/// Parse and validate a product file.
fn parse(content: &str) -> Result<Vec<NewProduct>, Box<dyn std::error::Error>> {
    let products: Vec<NewProduct> = serde_yaml::from_str(content)?;

    let mut invalid = 0;
    for (index, product) in products.iter().enumerate() {
        for problem in validate(product) {
            error!("  - product #{} ({}): {problem}", index + 1, product.name);
            invalid += 1;
        }
    }
    if invalid > 0 {
        return Err(format!("{invalid} validation errors found").into());
    }

    Ok(products)
}

/// Create every product in `file_path`.
///
/// The whole file is validated before anything is written.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, any entry is
/// invalid, or an insert fails.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let products = parse(&content)?;
    info!(products = products.len(), "Parsed and validated products");

    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let store = PgStore::new(pool);

    for product in &products {
        let created = store.create_product(product).await?;
        info!(product_id = %created.id, name = %created.name, "Product created");
    }

    info!("Seeding complete! {} products created", products.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let products = parse(
            r#"
- name: Desk Lamp
  price: "24.50"
  description: Warm light
  stock: 12
  category: Lighting
  images:
    - https://img.example/lamp.png
- name: Mug
  price: 8
  description: Holds coffee
  stock: 0
  category: Kitchen
"#,
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price.to_string(), "24.50");
        assert!(products[1].images.is_empty());
    }

    #[test]
    fn test_parse_rejects_invalid_entries() {
        let err = parse(
            r#"
- name: ""
  price: "1"
  description: x
  stock: -1
  category: Misc
"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "2 validation errors found");
    }

    #[test]
    fn test_parse_rejects_negative_price() {
        assert!(
            parse("- {name: A, price: \"-1\", description: x, stock: 1, category: B}").is_err()
        );
    }
}
