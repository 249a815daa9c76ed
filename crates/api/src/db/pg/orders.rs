//! Order placement and queries.
//!
//! Placement runs in one transaction: every product's stock is decremented
//! with a conditional `UPDATE ... WHERE stock >= $qty`, then the order and
//! its lines are inserted. Any failed condition returns before commit and
//! the transaction rolls back on drop.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;

use shopfloor_core::{ExternalUserId, OrderId, OrderStatus, ProductId, Quantity, UserId};

use super::products::{PRODUCT_COLUMNS, ProductRow};
use super::{PgStore, price_from_db};
use crate::db::{OrderStore, PlacementError, RepositoryError, combined_demand};
use crate::models::{
    AdminOrder, CustomerOrder, CustomerRef, Order, OrderDraft, OrderLine, PaymentResult, Product,
    ShippingAddress,
};

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.external_id, o.shipping_address, \
                             o.payment_result, o.total_price, o.status, o.shipped_at, \
                             o.delivered_at, o.created_at, o.updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: Option<UserId>,
    external_id: String,
    shipping_address: Json<ShippingAddress>,
    payment_result: Json<PaymentResult>,
    total_price: Decimal,
    status: OrderStatus,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CustomerOrderRow {
    #[sqlx(flatten)]
    order: OrderRow,
    has_reviewed: bool,
}

#[derive(sqlx::FromRow)]
struct AdminOrderRow {
    #[sqlx(flatten)]
    order: OrderRow,
    customer_name: Option<String>,
    customer_email: Option<String>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    product_id: ProductId,
    name: String,
    price: Decimal,
    image: String,
    quantity: i32,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderLine>) -> Result<Order, RepositoryError> {
        let external_id = ExternalUserId::parse(&self.external_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid external id in database: {e}"))
        })?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            external_id,
            items,
            shipping_address: self.shipping_address.0,
            payment_result: self.payment_result.0,
            total_price: price_from_db(self.total_price, "order total")?,
            status: self.status,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PgStore {
    /// Load line items (with their current products) for `rows` and build
    /// the orders, preserving the row order.
    async fn hydrate_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, product_id, name, price, image, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(&order_ids)
        .fetch_all(self.pool())
        .await?;

        let mut product_ids: Vec<i32> = item_rows.iter().map(|r| r.product_id.as_i32()).collect();
        product_ids.sort_unstable();
        product_ids.dedup();

        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let products = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product_ids)
            .fetch_all(self.pool())
            .await?
            .into_iter()
            .map(|row| Product::try_from(row).map(|p| (p.id, p)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut items: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for row in item_rows {
            let quantity = Quantity::new(row.quantity).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid quantity in database: {e}"))
            })?;
            items.entry(row.order_id).or_default().push(OrderLine {
                product_id: row.product_id,
                name: row.name,
                price: price_from_db(row.price, "line price")?,
                image: row.image,
                quantity,
                product: products.get(&row.product_id).cloned(),
            });
        }

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, draft: &OrderDraft) -> Result<Order, PlacementError> {
        let mut tx = self.pool().begin().await?;

        // Ascending product id order, so concurrent orders take row locks in
        // the same sequence.
        for (product_id, requested) in combined_demand(&draft.lines) {
            let decremented = sqlx::query_scalar::<_, i32>(
                r"
                UPDATE products
                SET stock = stock - $2, updated_at = now()
                WHERE id = $1 AND stock >= $2
                RETURNING stock
                ",
            )
            .bind(product_id)
            .bind(requested)
            .fetch_optional(&mut *tx)
            .await?;

            if decremented.is_none() {
                let available =
                    sqlx::query_scalar::<_, i32>("SELECT stock FROM products WHERE id = $1")
                        .bind(product_id)
                        .fetch_optional(&mut *tx)
                        .await?;

                return Err(match available {
                    None => PlacementError::ProductNotFound(product_id),
                    Some(available) => PlacementError::InsufficientStock {
                        product_id,
                        requested,
                        available,
                    },
                });
            }
        }

        let order_id = sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO orders (user_id, external_id, shipping_address, payment_result, total_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(draft.user_id)
        .bind(draft.external_id.as_str())
        .bind(Json(&draft.shipping_address))
        .bind(Json(&draft.payment_result))
        .bind(draft.total_price)
        .fetch_one(&mut *tx)
        .await?;

        for (position, line) in draft.lines.iter().enumerate() {
            let position = i16::try_from(position).map_err(|_| {
                RepositoryError::DataCorruption("too many order lines".to_owned())
            })?;
            sqlx::query(
                r"
                INSERT INTO order_items
                    (order_id, position, product_id, name, price, image, quantity)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(order_id)
            .bind(position)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.price)
            .bind(&line.image)
            .bind(line.quantity.get())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let order = self.get_order(order_id).await?.ok_or_else(|| {
            RepositoryError::DataCorruption(format!("order {order_id} missing after commit"))
        })?;
        Ok(order)
    }

    async fn list_orders_for(
        &self,
        external_id: &ExternalUserId,
    ) -> Result<Vec<CustomerOrder>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS},
                   EXISTS (SELECT 1 FROM reviews r WHERE r.order_id = o.id) AS has_reviewed
            FROM orders o
            WHERE o.external_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            "
        );
        let rows = sqlx::query_as::<_, CustomerOrderRow>(&sql)
            .bind(external_id.as_str())
            .fetch_all(self.pool())
            .await?;

        let flags: Vec<bool> = rows.iter().map(|r| r.has_reviewed).collect();
        let orders = self
            .hydrate_orders(rows.into_iter().map(|r| r.order).collect())
            .await?;

        Ok(orders
            .into_iter()
            .zip(flags)
            .map(|(order, has_reviewed)| CustomerOrder {
                order,
                has_reviewed,
            })
            .collect())
    }

    async fn list_all_orders(&self) -> Result<Vec<AdminOrder>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS},
                   u.name AS customer_name,
                   u.email AS customer_email
            FROM orders o
            LEFT JOIN users u ON u.id = o.user_id
            ORDER BY o.created_at DESC, o.id DESC
            "
        );
        let rows = sqlx::query_as::<_, AdminOrderRow>(&sql)
            .fetch_all(self.pool())
            .await?;

        let customers: Vec<Option<CustomerRef>> = rows
            .iter()
            .map(|r| match (&r.customer_name, &r.customer_email) {
                (Some(name), Some(email)) => Some(CustomerRef {
                    name: name.clone(),
                    email: email.clone(),
                }),
                _ => None,
            })
            .collect();
        let orders = self
            .hydrate_orders(rows.into_iter().map(|r| r.order).collect())
            .await?;

        Ok(orders
            .into_iter()
            .zip(customers)
            .map(|(order, user)| AdminOrder { order, user })
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => Ok(self.hydrate_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let updated = sqlx::query_scalar::<_, OrderId>(
            r"
            UPDATE orders
            SET status = $2,
                shipped_at = CASE WHEN $2 = 'shipped'::order_status
                                  THEN COALESCE(shipped_at, now()) ELSE shipped_at END,
                delivered_at = CASE WHEN $2 = 'delivered'::order_status
                                    THEN COALESCE(delivered_at, now()) ELSE delivered_at END,
                updated_at = now()
            WHERE id = $1
            RETURNING id
            ",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool())
        .await?;

        if updated.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.get_order(id).await?.ok_or(RepositoryError::NotFound)
    }
}
