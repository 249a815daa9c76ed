//! Shared setup for the database-backed tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use secrecy::SecretString;
use shopfloor_api::db::{PgStore, ProductStore, UserStore, create_pool};
use shopfloor_api::models::order::{OrderLineDraft, PaymentResult, ShippingAddress};
use shopfloor_api::models::{NewProduct, OrderDraft, Product, User, UserProfile};
use shopfloor_core::{Email, ExternalUserId, Price, Quantity};
use uuid::Uuid;

/// Database URL for integration tests.
pub fn database_url() -> String {
    let _ = dotenvy::dotenv();
    std::env::var("SHOPFLOOR_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("SHOPFLOOR_DATABASE_URL must be set for integration tests")
}

/// Connect, run migrations and wrap the pool in a store.
///
/// Tests share one database, so every fixture gets unique keys instead of
/// truncating tables.
pub async fn store() -> PgStore {
    let pool = create_pool(&SecretString::from(database_url()))
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("../api/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    PgStore::new(pool)
}

pub fn unique_external_id() -> ExternalUserId {
    ExternalUserId::parse(&format!("user_it_{}", Uuid::new_v4().simple())).unwrap()
}

pub async fn create_user(store: &PgStore) -> User {
    let external_id = unique_external_id();
    let email = Email::parse(&format!("{}@shopfloor.test", external_id.as_str())).unwrap();
    store
        .upsert_user(&UserProfile {
            external_id,
            name: "Integration Customer".to_string(),
            email,
            image_url: String::new(),
        })
        .await
        .expect("Failed to create user")
}

pub async fn create_product(store: &PgStore, stock: i32) -> Product {
    store
        .create_product(&NewProduct {
            name: format!("Test Product {}", Uuid::new_v4().simple()),
            price: "12.50".parse().unwrap(),
            description: "Created by integration tests".to_string(),
            stock,
            category: "Testing".to_string(),
            images: vec!["https://img.shopfloor.test/products/a.jpg".to_string()],
        })
        .await
        .expect("Failed to create product")
}

pub async fn stock_of(store: &PgStore, product: &Product) -> i32 {
    store
        .get_products(&[product.id])
        .await
        .unwrap()
        .pop()
        .expect("product disappeared")
        .stock
}

/// A draft for `user` with one line per `(product, quantity)`.
pub fn draft(user: &User, lines: &[(&Product, i32)]) -> OrderDraft {
    let lines: Vec<OrderLineDraft> = lines
        .iter()
        .map(|(product, quantity)| OrderLineDraft {
            product_id: product.id,
            quantity: Quantity::new(*quantity).unwrap(),
            name: product.name.clone(),
            price: product.price,
            image: product.primary_image(),
        })
        .collect();
    // The store records the total as given.
    let total_price: Price = lines.iter().map(|line| line.price).sum();

    OrderDraft {
        user_id: user.id,
        external_id: user.external_id.clone(),
        lines,
        shipping_address: ShippingAddress {
            full_name: "Integration Customer".to_string(),
            street_address: "1 Test Way".to_string(),
            city: "Portland".to_string(),
            state: "OR".to_string(),
            zip_code: "97201".to_string(),
            phone_number: "555-0100".to_string(),
        },
        payment_result: PaymentResult {
            id: format!("pay_{}", Uuid::new_v4().simple()),
            status: "succeeded".to_string(),
        },
        total_price,
    }
}
