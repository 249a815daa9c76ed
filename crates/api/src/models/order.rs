//! Orders, their line items and the snapshots taken at placement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfloor_core::{ExternalUserId, OrderId, OrderStatus, Price, ProductId, Quantity, UserId};

use super::product::Product;

/// Shipping address copied onto the order at placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone_number: String,
}

/// Payment processor result copied onto the order at placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentResult {
    pub id: String,
    pub status: String,
}

/// A validated line item, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineDraft {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub name: String,
    pub price: Price,
    pub image: String,
}

/// A fully assembled order that has not been persisted yet.
///
/// The stores persist it in one unit together with the stock decrement of
/// every line.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub external_id: ExternalUserId,
    pub lines: Vec<OrderLineDraft>,
    pub shipping_address: ShippingAddress,
    pub payment_result: PaymentResult,
    pub total_price: Price,
}

/// A persisted line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: String,
    pub quantity: Quantity,
    /// The current catalog product, `None` when it no longer exists.
    pub product: Option<Product>,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    /// Cleared when the owning user is deleted.
    pub user_id: Option<UserId>,
    pub external_id: ExternalUserId,
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_result: PaymentResult,
    pub total_price: Price,
    pub status: OrderStatus,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Move the order to `status`.
    ///
    /// `shipped_at` and `delivered_at` are stamped with `now` on the first
    /// entry into the matching status and never overwritten.
    pub fn apply_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        match status {
            OrderStatus::Shipped => {
                self.shipped_at.get_or_insert(now);
            }
            OrderStatus::Delivered => {
                self.delivered_at.get_or_insert(now);
            }
            OrderStatus::Pending => {}
        }
        self.updated_at = now;
    }

    /// Whether `product_id` appears on any line.
    #[must_use]
    pub fn contains_product(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|line| line.product_id == product_id)
    }
}

/// An order as its owner sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerOrder {
    #[serde(flatten)]
    pub order: Order,
    /// Whether any review exists for this order.
    pub has_reviewed: bool,
}

/// Name and email of the customer behind an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerRef {
    pub name: String,
    pub email: String,
}

/// An order as the admin listing shows it.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOrder {
    #[serde(flatten)]
    pub order: Order,
    /// `None` once the customer has been deleted.
    pub user: Option<CustomerRef>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn pending_order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            user_id: Some(UserId::new(1)),
            external_id: ExternalUserId::parse("user_1").unwrap(),
            items: vec![OrderLine {
                product_id: ProductId::new(7),
                name: "Mug".to_owned(),
                price: Price::from_cents(900).unwrap(),
                image: String::new(),
                quantity: Quantity::new(1).unwrap(),
                product: None,
            }],
            shipping_address: ShippingAddress::default(),
            payment_result: PaymentResult::default(),
            total_price: Price::from_cents(900).unwrap(),
            status: OrderStatus::Pending,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_shipped_at_set_once() {
        let mut order = pending_order();
        let first = Utc::now();
        order.apply_status(OrderStatus::Shipped, first);
        order.apply_status(OrderStatus::Shipped, first + Duration::hours(2));
        assert_eq!(order.shipped_at, Some(first));
        assert_eq!(order.delivered_at, None);
    }

    #[test]
    fn test_backward_transition_keeps_timestamps() {
        let mut order = pending_order();
        let shipped = Utc::now();
        order.apply_status(OrderStatus::Shipped, shipped);
        order.apply_status(OrderStatus::Delivered, shipped + Duration::days(1));
        order.apply_status(OrderStatus::Pending, shipped + Duration::days(2));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.shipped_at, Some(shipped));
        assert_eq!(order.delivered_at, Some(shipped + Duration::days(1)));
    }

    #[test]
    fn test_contains_product() {
        let order = pending_order();
        assert!(order.contains_product(ProductId::new(7)));
        assert!(!order.contains_product(ProductId::new(8)));
    }

    #[test]
    fn test_customer_order_json_shape() {
        let json = serde_json::to_value(CustomerOrder {
            order: pending_order(),
            has_reviewed: false,
        })
        .unwrap();
        assert_eq!(json["hasReviewed"], false);
        assert_eq!(json["status"], "pending");
        assert!(json["totalPrice"].is_string());
        assert!(json["items"][0]["product"].is_null());
        assert_eq!(json["items"][0]["productId"], 7);
    }
}
