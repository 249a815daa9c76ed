//! Order placement workflow and order queries.
//!
//! Placement runs in three steps:
//!
//! 1. [`OrderService::check_inventory`] validates every line against the
//!    catalog and snapshots name, price and image. The stock comparison here
//!    is advisory and only produces early, descriptive errors.
//! 2. [`assemble_order`] builds the single [`OrderDraft`] for the request.
//! 3. [`OrderStore::place_order`](crate::db::OrderStore::place_order)
//!    persists it together with a conditional stock decrement for every
//!    product. That is the step that actually guarantees stock never goes
//!    negative.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use shopfloor_core::{InvalidOrderStatus, OrderId, OrderStatus, Price, ProductId, Quantity};

use crate::db::{PlacementError, RepositoryError, Store, combined_demand};
use crate::models::{
    CustomerOrder, Order, OrderDraft, OrderLineDraft, PaymentResult, ShippingAddress, User,
};

/// Most lines a single order may carry.
pub const MAX_ORDER_LINES: usize = 100;

/// Errors from the order workflow.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request has no line items.
    #[error("No order items")]
    EmptyOrder,

    /// The request has more lines than allowed.
    #[error("An order may contain at most {max} items")]
    TooManyLines { max: usize },

    /// A line names an unknown product.
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// Not enough stock to cover a product's combined quantity.
    #[error("Insufficient stock for {name}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: i32,
        available: i32,
    },

    /// The requested status is not a known status.
    #[error("Invalid status")]
    InvalidStatus(#[from] InvalidOrderStatus),

    /// No order with that id.
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<PlacementError> for OrderError {
    fn from(e: PlacementError) -> Self {
        match e {
            PlacementError::ProductNotFound(id) => Self::ProductNotFound(id),
            PlacementError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                name: format!("product {product_id}"),
                requested,
                available,
            },
            PlacementError::Repository(e) => Self::Repository(e),
        }
    }
}

/// One requested line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    #[serde(alias = "product")]
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub order_items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_result: PaymentResult,
    pub total_price: Price,
}

/// Build the one order for a request from already validated lines.
#[must_use]
pub fn assemble_order(
    user: &User,
    lines: Vec<OrderLineDraft>,
    shipping_address: ShippingAddress,
    payment_result: PaymentResult,
    total_price: Price,
) -> OrderDraft {
    OrderDraft {
        user_id: user.id,
        external_id: user.external_id.clone(),
        lines,
        shipping_address,
        payment_result,
        total_price,
    }
}

/// Order operations over a [`Store`].
pub struct OrderService<'a> {
    store: &'a dyn Store,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Validate lines against the catalog and snapshot each product.
    ///
    /// Lines keep the request order. Quantities for the same product are
    /// summed before comparing against stock.
    ///
    /// # Errors
    ///
    /// Returns `EmptyOrder`, `TooManyLines`, `ProductNotFound` or
    /// `InsufficientStock`, or `Repository` if the catalog read fails.
    pub async fn check_inventory(
        &self,
        items: &[OrderItemRequest],
    ) -> Result<Vec<OrderLineDraft>, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        if items.len() > MAX_ORDER_LINES {
            return Err(OrderError::TooManyLines {
                max: MAX_ORDER_LINES,
            });
        }

        let mut ids: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let products: HashMap<_, _> = self
            .store
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let lines = items
            .iter()
            .map(|item| {
                let product = products
                    .get(&item.product_id)
                    .ok_or(OrderError::ProductNotFound(item.product_id))?;
                Ok(OrderLineDraft {
                    product_id: product.id,
                    quantity: item.quantity,
                    name: product.name.clone(),
                    price: product.price,
                    image: product.primary_image(),
                })
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        for (product_id, requested) in combined_demand(&lines) {
            if let Some(product) = products.get(&product_id)
                && product.stock < requested
            {
                return Err(OrderError::InsufficientStock {
                    product_id,
                    name: product.name.clone(),
                    requested,
                    available: product.stock,
                });
            }
        }

        Ok(lines)
    }

    /// Place an order for `user`.
    ///
    /// # Errors
    ///
    /// Any [`check_inventory`](Self::check_inventory) error, or
    /// `InsufficientStock`/`ProductNotFound` if the catalog changed between
    /// the check and the write. In every error case nothing is persisted.
    #[instrument(skip(self, user, request), fields(user_id = %user.id, lines = request.order_items.len()))]
    pub async fn place_order(
        &self,
        user: &User,
        request: PlaceOrderRequest,
    ) -> Result<Order, OrderError> {
        let lines = self.check_inventory(&request.order_items).await?;

        let subtotal: Decimal = lines
            .iter()
            .map(|l| l.price.amount() * Decimal::from(l.quantity.get()))
            .sum();
        if request.total_price.amount() < subtotal {
            warn!(
                total = %request.total_price,
                subtotal = %subtotal,
                "Order total is below the line subtotal"
            );
        }

        let draft = assemble_order(
            user,
            lines,
            request.shipping_address,
            request.payment_result,
            request.total_price,
        );

        let order = self.store.place_order(&draft).await.map_err(|e| {
            let e = OrderError::from(e);
            if let OrderError::InsufficientStock { product_id, .. } = &e {
                warn!(%product_id, "Stock changed between check and placement");
            }
            e
        })?;

        info!(order_id = %order.id, total = %order.total_price, "Order placed");
        Ok(order)
    }

    /// The user's orders, newest first, with the review flag.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the query fails.
    pub async fn orders_for(&self, user: &User) -> Result<Vec<CustomerOrder>, OrderError> {
        Ok(self.store.list_orders_for(&user.external_id).await?)
    }

    /// Move an order to the status named by `status`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatus` for an unknown status string and
    /// `OrderNotFound` if the order does not exist.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: OrderId, status: &str) -> Result<Order, OrderError> {
        let status: OrderStatus = status.parse()?;

        let order = self
            .store
            .set_order_status(id, status)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => OrderError::OrderNotFound(id),
                e => OrderError::Repository(e),
            })?;

        info!(order_id = %id, %status, "Order status updated");
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use shopfloor_core::{Email, ExternalUserId};

    use super::*;
    use crate::db::{MemoryStore, ProductStore, UserStore};
    use crate::models::{NewProduct, Product, UserProfile};

    async fn setup(stock: i32) -> (MemoryStore, User, Product) {
        let store = MemoryStore::new();
        let user = store
            .upsert_user(&UserProfile {
                external_id: ExternalUserId::parse("user_p1").unwrap(),
                name: "Pat".to_owned(),
                email: Email::parse("pat@example.com").unwrap(),
                image_url: String::new(),
            })
            .await
            .unwrap();
        let product = store
            .create_product(&NewProduct {
                name: "P1".to_owned(),
                price: Price::from_cents(1000).unwrap(),
                description: "first product".to_owned(),
                stock,
                category: "misc".to_owned(),
                images: vec!["https://img.example/p1.png".to_owned()],
            })
            .await
            .unwrap();
        (store, user, product)
    }

    fn request(lines: &[(ProductId, i32)]) -> PlaceOrderRequest {
        PlaceOrderRequest {
            order_items: lines
                .iter()
                .map(|(id, q)| OrderItemRequest {
                    product_id: *id,
                    quantity: Quantity::new(*q).unwrap(),
                })
                .collect(),
            shipping_address: ShippingAddress::default(),
            payment_result: PaymentResult::default(),
            total_price: Price::from_cents(3000).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_place_then_run_out() {
        let (store, user, p1) = setup(5).await;
        let service = OrderService::new(&store);

        let order = service
            .place_order(&user, request(&[(p1.id, 3)]))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items[0].name, "P1");
        assert_eq!(order.items[0].image, "https://img.example/p1.png");
        assert_eq!(order.items[0].product.as_ref().map(|p| p.stock), Some(2));

        let err = service
            .place_order(&user, request(&[(p1.id, 3)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { requested: 3, available: 2, .. }
        ));
        assert_eq!(store.get_products(&[p1.id]).await.unwrap()[0].stock, 2);
        assert_eq!(service.orders_for(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let (store, user, _) = setup(5).await;
        let err = OrderService::new(&store)
            .place_order(&user, request(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::EmptyOrder));
    }

    #[tokio::test]
    async fn test_unknown_product_rejected_before_write() {
        let (store, user, p1) = setup(5).await;
        let err = OrderService::new(&store)
            .place_order(&user, request(&[(p1.id, 1), (ProductId::new(42), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound(id) if id.as_i32() == 42));
        assert_eq!(store.get_products(&[p1.id]).await.unwrap()[0].stock, 5);
    }

    #[tokio::test]
    async fn test_check_combines_repeated_lines() {
        let (store, _, p1) = setup(5).await;
        let items = request(&[(p1.id, 3), (p1.id, 3)]).order_items;
        let err = OrderService::new(&store)
            .check_inventory(&items)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { requested: 6, available: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_last_unit() {
        let (store, user, p1) = setup(1).await;
        let store = Arc::new(store);

        let product_id = p1.id;
        let place = move |store: Arc<MemoryStore>, user: User| async move {
            OrderService::new(&*store)
                .place_order(&user, request(&[(product_id, 1)]))
                .await
        };
        let (a, b) = tokio::join!(
            tokio::spawn(place(Arc::clone(&store), user.clone())),
            tokio::spawn(place(Arc::clone(&store), user.clone())),
        );
        let results = [a.unwrap(), b.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(OrderError::InsufficientStock { .. })))
        );
        assert_eq!(store.get_products(&[p1.id]).await.unwrap()[0].stock, 0);
    }

    #[tokio::test]
    async fn test_update_status() {
        let (store, user, p1) = setup(5).await;
        let service = OrderService::new(&store);
        let order = service
            .place_order(&user, request(&[(p1.id, 1)]))
            .await
            .unwrap();

        let shipped = service.update_status(order.id, "shipped").await.unwrap();
        let again = service.update_status(order.id, "shipped").await.unwrap();
        assert_eq!(shipped.shipped_at, again.shipped_at);

        assert!(matches!(
            service.update_status(order.id, "cancelled").await,
            Err(OrderError::InvalidStatus(_))
        ));
        assert!(matches!(
            service.update_status(OrderId::new(999), "delivered").await,
            Err(OrderError::OrderNotFound(_))
        ));
    }

    #[test]
    fn test_request_accepts_product_alias() {
        let body = r#"{
            "orderItems": [{"product": 3, "quantity": 2}],
            "shippingAddress": {"fullName": "Pat", "city": "Oslo"},
            "totalPrice": "19.90"
        }"#;
        let request: PlaceOrderRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.order_items[0].product_id, ProductId::new(3));
        assert_eq!(request.shipping_address.city, "Oslo");
        assert_eq!(request.payment_result, PaymentResult::default());
    }

    #[test]
    fn test_request_rejects_zero_quantity() {
        let body = r#"{
            "orderItems": [{"productId": 3, "quantity": 0}],
            "shippingAddress": {},
            "totalPrice": 5
        }"#;
        assert!(serde_json::from_str::<PlaceOrderRequest>(body).is_err());
    }
}
