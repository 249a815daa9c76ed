//! In-memory [`Store`] backend.
//!
//! All state sits behind one `parking_lot::RwLock`. Writes that touch more
//! than one record (order placement, default-address switching, user
//! deletion) happen under a single write guard, which gives them the same
//! all-or-nothing behavior the `PostgreSQL` backend gets from a transaction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use shopfloor_core::{
    AddressId, ExternalUserId, OrderId, OrderStatus, Price, ProductId, ReviewId, UserId,
};

use super::{
    OrderStore, PlacementError, ProductStore, RepositoryError, ReviewStore, Store, UserStore,
    combined_demand,
};
use crate::models::{
    Address, AddressPatch, AdminOrder, CustomerOrder, CustomerRef, DashboardStats, NewAddress,
    NewProduct, NewReview, Order, OrderDraft, OrderLine, Product, ProductPatch, Review, User,
    UserProfile,
};

/// Process-local store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    last_id: Counters,
    users: BTreeMap<UserId, User>,
    addresses: BTreeMap<UserId, Vec<Address>>,
    wishlists: BTreeMap<UserId, Vec<ProductId>>,
    products: BTreeMap<ProductId, Product>,
    /// Orders as placed; `OrderLine::product` is filled in on read.
    orders: BTreeMap<OrderId, Order>,
    reviews: Vec<Review>,
}

#[derive(Debug, Default)]
struct Counters {
    user: i32,
    address: i32,
    product: i32,
    order: i32,
    review: i32,
}

fn next(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

impl State {
    fn user_by_external_id(&self, external_id: &ExternalUserId) -> Option<&User> {
        self.users.values().find(|u| &u.external_id == external_id)
    }

    /// Attach the current product to every line.
    fn hydrate(&self, order: &Order) -> Order {
        let mut order = order.clone();
        for line in &mut order.items {
            line.product = self.products.get(&line.product_id).cloned();
        }
        order
    }

    fn has_review(&self, order_id: OrderId) -> bool {
        self.reviews.iter().any(|r| r.order_id == order_id)
    }

    fn wishlist_ids(&self, user_id: UserId) -> Vec<ProductId> {
        self.wishlists.get(&user_id).cloned().unwrap_or_default()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_external_id(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().user_by_external_id(external_id).cloned())
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<User, RepositoryError> {
        let mut state = self.state.write();

        let email_taken = state
            .users
            .values()
            .any(|u| u.email == profile.email && u.external_id != profile.external_id);
        if email_taken {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let existing = state.user_by_external_id(&profile.external_id).map(|u| u.id);
        let id = existing.unwrap_or_else(|| UserId::new(next(&mut state.last_id.user)));

        let user = state.users.entry(id).or_insert_with(|| User {
            id,
            external_id: profile.external_id.clone(),
            name: String::new(),
            email: profile.email.clone(),
            image_url: String::new(),
            created_at: now,
            updated_at: now,
        });
        user.name.clone_from(&profile.name);
        user.email = profile.email.clone();
        user.image_url.clone_from(&profile.image_url);
        user.updated_at = now;

        Ok(user.clone())
    }

    async fn delete_user_by_external_id(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write();

        let Some(id) = state.user_by_external_id(external_id).map(|u| u.id) else {
            return Ok(false);
        };

        state.users.remove(&id);
        state.addresses.remove(&id);
        state.wishlists.remove(&id);
        state.reviews.retain(|r| r.user_id != id);
        for order in state.orders.values_mut() {
            if order.user_id == Some(id) {
                order.user_id = None;
            }
        }

        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.state.read().users.values().rev().cloned().collect())
    }

    async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        Ok(self
            .state
            .read()
            .addresses
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_address(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Vec<Address>, RepositoryError> {
        let mut state = self.state.write();
        let id = AddressId::new(next(&mut state.last_id.address));

        let addresses = state.addresses.entry(user_id).or_default();
        if address.is_default {
            for a in addresses.iter_mut() {
                a.is_default = false;
            }
        }
        addresses.push(Address {
            id,
            label: address.label.clone(),
            full_name: address.full_name.clone(),
            street_address: address.street_address.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            zip_code: address.zip_code.clone(),
            phone_number: address.phone_number.clone(),
            is_default: address.is_default,
        });

        Ok(addresses.clone())
    }

    async fn update_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
        patch: &AddressPatch,
    ) -> Result<Vec<Address>, RepositoryError> {
        let mut state = self.state.write();
        let addresses = state
            .addresses
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound)?;

        if !addresses.iter().any(|a| a.id == address_id) {
            return Err(RepositoryError::NotFound);
        }

        for address in addresses.iter_mut() {
            if address.id == address_id {
                patch.apply(address);
            } else if patch.is_default == Some(true) {
                address.is_default = false;
            }
        }

        Ok(addresses.clone())
    }

    async fn delete_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<Vec<Address>, RepositoryError> {
        let mut state = self.state.write();
        let addresses = state
            .addresses
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound)?;

        let before = addresses.len();
        addresses.retain(|a| a.id != address_id);
        if addresses.len() == before {
            return Err(RepositoryError::NotFound);
        }

        Ok(addresses.clone())
    }

    async fn wishlist_products(&self, user_id: UserId) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read();
        Ok(state
            .wishlist_ids(user_id)
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        let mut state = self.state.write();
        if !state.products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound);
        }

        let wishlist = state.wishlists.entry(user_id).or_default();
        if wishlist.contains(&product_id) {
            return Err(RepositoryError::Conflict(
                "product already in wishlist".to_owned(),
            ));
        }
        wishlist.push(product_id);

        Ok(wishlist.clone())
    }

    async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        let mut state = self.state.write();
        let wishlist = state
            .wishlists
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound)?;

        let before = wishlist.len();
        wishlist.retain(|id| *id != product_id);
        if wishlist.len() == before {
            return Err(RepositoryError::NotFound);
        }

        Ok(wishlist.clone())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.state.read().products.values().rev().cloned().collect())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.state.write();
        let id = ProductId::new(next(&mut state.last_id.product));
        let now = Utc::now();

        let product = Product {
            id,
            name: product.name.clone(),
            price: product.price,
            description: product.description.clone(),
            stock: product.stock,
            category: product.category.clone(),
            images: product.images.clone(),
            created_at: now,
            updated_at: now,
        };
        state.products.insert(id, product.clone());

        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.write();
        let product = state
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;

        patch.apply(product);
        product.updated_at = Utc::now();

        Ok(product.clone())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(&self, draft: &OrderDraft) -> Result<Order, PlacementError> {
        let mut state = self.state.write();
        let demand = combined_demand(&draft.lines);

        // Check every product before touching any of them.
        for (&product_id, &requested) in &demand {
            let product = state
                .products
                .get(&product_id)
                .ok_or(PlacementError::ProductNotFound(product_id))?;
            if product.stock < requested {
                return Err(PlacementError::InsufficientStock {
                    product_id,
                    requested,
                    available: product.stock,
                });
            }
        }

        let now = Utc::now();
        for (product_id, requested) in &demand {
            if let Some(product) = state.products.get_mut(product_id) {
                product.stock -= requested;
                product.updated_at = now;
            }
        }

        let id = OrderId::new(next(&mut state.last_id.order));
        let order = Order {
            id,
            user_id: Some(draft.user_id),
            external_id: draft.external_id.clone(),
            items: draft
                .lines
                .iter()
                .map(|line| OrderLine {
                    product_id: line.product_id,
                    name: line.name.clone(),
                    price: line.price,
                    image: line.image.clone(),
                    quantity: line.quantity,
                    product: None,
                })
                .collect(),
            shipping_address: draft.shipping_address.clone(),
            payment_result: draft.payment_result.clone(),
            total_price: draft.total_price,
            status: OrderStatus::Pending,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(id, order.clone());

        Ok(state.hydrate(&order))
    }

    async fn list_orders_for(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Vec<CustomerOrder>, RepositoryError> {
        let state = self.state.read();
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| &o.external_id == external_id)
            .map(|o| CustomerOrder {
                order: state.hydrate(o),
                has_reviewed: state.has_review(o.id),
            })
            .collect())
    }

    async fn list_all_orders(&self) -> Result<Vec<AdminOrder>, RepositoryError> {
        let state = self.state.read();
        Ok(state
            .orders
            .values()
            .rev()
            .map(|o| AdminOrder {
                order: state.hydrate(o),
                user: o
                    .user_id
                    .and_then(|id| state.users.get(&id))
                    .map(|u| CustomerRef {
                        name: u.name.clone(),
                        email: u.email.to_string(),
                    }),
            })
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read();
        Ok(state.orders.get(&id).map(|o| state.hydrate(o)))
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.state.write();
        let order = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.apply_status(status, Utc::now());
        let order = order.clone();

        Ok(state.hydrate(&order))
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn create_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let mut state = self.state.write();

        let duplicate = state
            .reviews
            .iter()
            .any(|r| r.order_id == review.order_id && r.product_id == review.product_id);
        if duplicate {
            return Err(RepositoryError::Conflict(
                "product already reviewed for this order".to_owned(),
            ));
        }

        let review = Review {
            id: ReviewId::new(next(&mut state.last_id.review)),
            order_id: review.order_id,
            product_id: review.product_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Utc::now(),
        };
        state.reviews.push(review.clone());

        Ok(review)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn dashboard_stats(&self) -> Result<DashboardStats, RepositoryError> {
        let state = self.state.read();
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);

        Ok(DashboardStats {
            total_orders: count(state.orders.len()),
            total_revenue: state.orders.values().map(|o| o.total_price).sum::<Price>(),
            total_products: count(state.products.len()),
            total_customers: count(state.users.len()),
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use shopfloor_core::{Email, Quantity};

    use super::*;
    use crate::models::{OrderLineDraft, PaymentResult, ShippingAddress};

    async fn seed_user(store: &MemoryStore, sub: &str) -> User {
        store
            .upsert_user(&UserProfile {
                external_id: ExternalUserId::parse(sub).unwrap(),
                name: "Test User".to_owned(),
                email: Email::parse(&format!("{sub}@example.com")).unwrap(),
                image_url: String::new(),
            })
            .await
            .unwrap()
    }

    async fn seed_product(store: &MemoryStore, stock: i32) -> Product {
        store
            .create_product(&NewProduct {
                name: "Desk Lamp".to_owned(),
                price: Price::from_cents(450).unwrap(),
                description: "Adjustable arm".to_owned(),
                stock,
                category: "lighting".to_owned(),
                images: vec!["https://img.example/p.png".to_owned()],
            })
            .await
            .unwrap()
    }

    fn draft(user: &User, lines: &[(&Product, i32)]) -> OrderDraft {
        OrderDraft {
            user_id: user.id,
            external_id: user.external_id.clone(),
            lines: lines
                .iter()
                .map(|(p, q)| OrderLineDraft {
                    product_id: p.id,
                    quantity: Quantity::new(*q).unwrap(),
                    name: p.name.clone(),
                    price: p.price,
                    image: p.primary_image(),
                })
                .collect(),
            shipping_address: ShippingAddress::default(),
            payment_result: PaymentResult::default(),
            total_price: Price::ZERO,
        }
    }

    async fn stock_of(store: &MemoryStore, id: ProductId) -> i32 {
        store.get_products(&[id]).await.unwrap()[0].stock
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_no_trace() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let plenty = seed_product(&store, 10).await;
        let scarce = seed_product(&store, 1).await;

        let result = store
            .place_order(&draft(&user, &[(&plenty, 2), (&scarce, 2)]))
            .await;

        assert!(matches!(
            result,
            Err(PlacementError::InsufficientStock { requested: 2, available: 1, .. })
        ));
        assert_eq!(stock_of(&store, plenty.id).await, 10);
        assert_eq!(stock_of(&store, scarce.id).await, 1);
        assert!(store.list_all_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let mut ghost = seed_product(&store, 5).await;
        ghost.id = ProductId::new(999);

        let result = store.place_order(&draft(&user, &[(&ghost, 1)])).await;
        assert!(matches!(result, Err(PlacementError::ProductNotFound(id)) if id.as_i32() == 999));
    }

    #[tokio::test]
    async fn test_many_lines_make_one_order() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let a = seed_product(&store, 5).await;
        let b = seed_product(&store, 5).await;

        let order = store
            .place_order(&draft(&user, &[(&a, 1), (&b, 2), (&a, 1)]))
            .await
            .unwrap();

        assert_eq!(order.items.len(), 3);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(store.list_all_orders().await.unwrap().len(), 1);
        assert_eq!(stock_of(&store, a.id).await, 3);
        assert_eq!(stock_of(&store, b.id).await, 3);
    }

    #[tokio::test]
    async fn test_repeated_product_lines_are_combined() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let p = seed_product(&store, 3).await;

        let result = store.place_order(&draft(&user, &[(&p, 2), (&p, 2)])).await;
        assert!(matches!(
            result,
            Err(PlacementError::InsufficientStock { requested: 4, available: 3, .. })
        ));
        assert_eq!(stock_of(&store, p.id).await, 3);
    }

    #[tokio::test]
    async fn test_reorder_after_stock_drops() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let p1 = seed_product(&store, 5).await;

        store.place_order(&draft(&user, &[(&p1, 3)])).await.unwrap();
        assert_eq!(stock_of(&store, p1.id).await, 2);

        let again = store.place_order(&draft(&user, &[(&p1, 3)])).await;
        assert!(matches!(again, Err(PlacementError::InsufficientStock { .. })));
        assert_eq!(stock_of(&store, p1.id).await, 2);

        let orders = store.list_orders_for(&user.external_id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_concurrent_orders_for_last_unit() {
        let store = Arc::new(MemoryStore::new());
        let alice = seed_user(&store, "user_alice").await;
        let bob = seed_user(&store, "user_bob").await;
        let p = seed_product(&store, 1).await;

        let first = tokio::spawn({
            let store = Arc::clone(&store);
            let draft = draft(&alice, &[(&p, 1)]);
            async move { store.place_order(&draft).await }
        });
        let second = tokio::spawn({
            let store = Arc::clone(&store);
            let draft = draft(&bob, &[(&p, 1)]);
            async move { store.place_order(&draft).await }
        });
        let (first, second) = tokio::join!(first, second);
        let results = [first.unwrap(), second.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(PlacementError::InsufficientStock { .. })))
        );
        assert_eq!(stock_of(&store, p.id).await, 0);
    }

    #[tokio::test]
    async fn test_orders_newest_first_with_review_flag() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let p = seed_product(&store, 10).await;

        let older = store.place_order(&draft(&user, &[(&p, 1)])).await.unwrap();
        let newer = store.place_order(&draft(&user, &[(&p, 1)])).await.unwrap();
        store
            .create_review(&NewReview {
                order_id: older.id,
                product_id: p.id,
                user_id: user.id,
                rating: 5,
                comment: String::new(),
            })
            .await
            .unwrap();

        let orders = store.list_orders_for(&user.external_id).await.unwrap();
        assert_eq!(orders[0].order.id, newer.id);
        assert!(!orders[0].has_reviewed);
        assert_eq!(orders[1].order.id, older.id);
        assert!(orders[1].has_reviewed);
        assert_eq!(
            orders[0].order.items[0].product.as_ref().map(|p| p.stock),
            Some(8)
        );
    }

    #[tokio::test]
    async fn test_duplicate_review_conflicts() {
        let store = MemoryStore::new();
        let review = NewReview {
            order_id: OrderId::new(1),
            product_id: ProductId::new(1),
            user_id: UserId::new(1),
            rating: 4,
            comment: "ok".to_owned(),
        };
        store.create_review(&review).await.unwrap();
        assert!(matches!(
            store.create_review(&review).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_single_default_address() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let home = NewAddress {
            label: "Home".to_owned(),
            is_default: true,
            ..NewAddress::default()
        };
        let work = NewAddress {
            label: "Work".to_owned(),
            is_default: true,
            ..NewAddress::default()
        };

        store.add_address(user.id, &home).await.unwrap();
        let addresses = store.add_address(user.id, &work).await.unwrap();
        assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);
        assert!(addresses[1].is_default);

        let patch = AddressPatch {
            is_default: Some(true),
            ..AddressPatch::default()
        };
        let addresses = store
            .update_address(user.id, addresses[0].id, &patch)
            .await
            .unwrap();
        assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);
        assert!(addresses[0].is_default);
    }

    #[tokio::test]
    async fn test_update_address_patches_only_target() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let home = NewAddress {
            label: "Home".to_owned(),
            city: "Oslo".to_owned(),
            is_default: true,
            ..NewAddress::default()
        };
        store.add_address(user.id, &home).await.unwrap();
        let addresses = store
            .add_address(user.id, &NewAddress::default())
            .await
            .unwrap();
        let second = addresses.iter().find(|a| !a.is_default).unwrap().id;

        let patch = AddressPatch {
            city: Some("Bergen".to_owned()),
            ..AddressPatch::default()
        };
        let addresses = store.update_address(user.id, second, &patch).await.unwrap();
        let updated = addresses.iter().find(|a| a.id == second).unwrap();
        let untouched = addresses.iter().find(|a| a.id != second).unwrap();
        assert_eq!(updated.city, "Bergen");
        assert!(!updated.is_default);
        assert_eq!(untouched.city, "Oslo");
        assert!(untouched.is_default);

        let missing = store
            .update_address(user.id, AddressId::new(9999), &patch)
            .await;
        assert!(matches!(missing, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_address_of_other_user_not_found() {
        let store = MemoryStore::new();
        let alice = seed_user(&store, "user_alice").await;
        let bob = seed_user(&store, "user_bob").await;
        let addresses = store
            .add_address(alice.id, &NewAddress::default())
            .await
            .unwrap();

        let result = store.delete_address(bob.id, addresses[0].id).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_shipped_twice_keeps_first_timestamp() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let p = seed_product(&store, 1).await;
        let order = store.place_order(&draft(&user, &[(&p, 1)])).await.unwrap();

        let first = store
            .set_order_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        let second = store
            .set_order_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        assert!(first.shipped_at.is_some());
        assert_eq!(first.shipped_at, second.shipped_at);
        assert!(matches!(
            store
                .set_order_status(OrderId::new(404), OrderStatus::Shipped)
                .await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_user_twice() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let p = seed_product(&store, 1).await;
        let order = store.place_order(&draft(&user, &[(&p, 1)])).await.unwrap();

        assert!(store.delete_user_by_external_id(&user.external_id).await.unwrap());
        assert!(!store.delete_user_by_external_id(&user.external_id).await.unwrap());
        assert!(
            store
                .find_user_by_external_id(&user.external_id)
                .await
                .unwrap()
                .is_none()
        );

        let kept = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(kept.user_id, None);
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let store = MemoryStore::new();
        let created = seed_user(&store, "user_a").await;
        let updated = store
            .upsert_user(&UserProfile {
                external_id: created.external_id.clone(),
                name: "Renamed".to_owned(),
                email: created.email.clone(),
                image_url: "https://img.example/a.png".to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Renamed");
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_email_owned_by_other_user_conflicts() {
        let store = MemoryStore::new();
        let alice = seed_user(&store, "user_alice").await;
        let result = store
            .upsert_user(&UserProfile {
                external_id: ExternalUserId::parse("user_mallory").unwrap(),
                name: "Mallory".to_owned(),
                email: alice.email.clone(),
                image_url: String::new(),
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_wishlist_rules() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let p = seed_product(&store, 1).await;

        assert_eq!(store.add_to_wishlist(user.id, p.id).await.unwrap(), vec![p.id]);
        assert!(matches!(
            store.add_to_wishlist(user.id, p.id).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            store.add_to_wishlist(user.id, ProductId::new(77)).await,
            Err(RepositoryError::NotFound)
        ));
        assert_eq!(store.wishlist_products(user.id).await.unwrap()[0].id, p.id);

        assert!(store.remove_from_wishlist(user.id, p.id).await.unwrap().is_empty());
        assert!(matches!(
            store.remove_from_wishlist(user.id, p.id).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "user_a").await;
        let p = seed_product(&store, 5).await;
        let mut order = draft(&user, &[(&p, 1)]);
        order.total_price = Price::from_cents(1050).unwrap();
        store.place_order(&order).await.unwrap();
        store.place_order(&order).await.unwrap();

        let stats = store.dashboard_stats().await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.total_revenue, Price::from_cents(2100).unwrap());
        assert_eq!(stats.total_products, 1);
        assert_eq!(stats.total_customers, 1);
    }
}
