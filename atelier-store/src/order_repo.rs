use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use atelier_catalog::{CartLine, ItemRef};
use atelier_core::{CoreError, CoreResult, OrderStatus, PaymentStatus};
use atelier_order::{CartRepository, Order, OrderLine, OrderRepository};

use crate::database::map_db_error;

const ORDER_COLUMNS: &str = "id, order_number, owner_id, items, total_qty, sub_total_amt, total_amt, \
     delivery_address_id, payment_method, payment_status, order_status, order_date, updated_at";

/// Orders and carts in PostgreSQL. Line items are stored as a JSONB document on the order.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    owner_id: String,
    items: Json<Vec<OrderLine>>,
    total_qty: i32,
    sub_total_amt: i64,
    total_amt: i64,
    delivery_address_id: Uuid,
    payment_method: String,
    payment_status: String,
    order_status: String,
    order_date: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            owner_id: row.owner_id,
            items: row.items.0,
            total_qty: u32::try_from(row.total_qty).map_err(CoreError::internal)?,
            sub_total_amt: row.sub_total_amt,
            total_amt: row.total_amt,
            delivery_address_id: row.delivery_address_id,
            payment_method: row.payment_method.parse().map_err(CoreError::internal)?,
            payment_status: row.payment_status.parse().map_err(CoreError::internal)?,
            order_status: row.order_status.parse().map_err(CoreError::internal)?,
            order_date: row.order_date,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    item_type: String,
    item_id: Uuid,
    quantity: i32,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = CoreError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(CoreError::internal)?;
        match row.item_type.as_str() {
            "PRODUCT" => Ok(CartLine::product(row.item_id, quantity)),
            "BUNDLE" => Ok(CartLine::bundle(row.item_id, quantity)),
            other => Err(CoreError::InternalError(format!("unknown cart item type {}", other))),
        }
    }
}

fn item_type(item: &ItemRef) -> &'static str {
    match item {
        ItemRef::Product { .. } => "PRODUCT",
        ItemRef::Bundle { .. } => "BUNDLE",
    }
}

/// Quantities are stored as INTEGER.
fn quantity_column(quantity: u32) -> CoreResult<i32> {
    i32::try_from(quantity).map_err(|_| CoreError::ValidationError("quantity is too large".to_string()))
}

fn into_orders(rows: Vec<OrderRow>) -> CoreResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert_and_clear_cart(&self, order: &Order) -> CoreResult<()> {
        let total_qty = quantity_column(order.total_qty)?;
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, owner_id, items, total_qty, sub_total_amt, total_amt,
                                delivery_address_id, payment_method, payment_status, order_status, order_date, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(&order.owner_id)
        .bind(Json(&order.items))
        .bind(total_qty)
        .bind(order.sub_total_amt)
        .bind(order.total_amt)
        .bind(order.delivery_address_id)
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.order_status.as_str())
        .bind(order.order_date)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query("DELETE FROM cart_lines WHERE owner_id = $1")
            .bind(&order.owner_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        row.map(Order::try_from).transpose()
    }

    async fn list_for_owner(&self, owner_id: &str) -> CoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE owner_id = $1 ORDER BY order_date DESC",
            ORDER_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        into_orders(rows)
    }

    async fn list_all(&self) -> CoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders ORDER BY order_date DESC",
            ORDER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        into_orders(rows)
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        payment_status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET order_status = $3, payment_status = $4, updated_at = $5 \
             WHERE id = $1 AND order_status = $2 RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(payment_status.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.map(Order::try_from).transpose()
    }
}

#[async_trait]
impl CartRepository for PgOrderRepository {
    async fn get_cart(&self, owner_id: &str) -> CoreResult<Vec<CartLine>> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            "SELECT item_type, item_id, quantity FROM cart_lines WHERE owner_id = $1 ORDER BY added_at",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        rows.into_iter().map(CartLine::try_from).collect()
    }

    async fn add_line(&self, owner_id: &str, line: &CartLine) -> CoreResult<Vec<CartLine>> {
        let quantity = quantity_column(line.quantity)?;

        sqlx::query(
            r#"
            INSERT INTO cart_lines (owner_id, item_type, item_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (owner_id, item_type, item_id)
            DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(owner_id)
        .bind(item_type(&line.item))
        .bind(line.item.id())
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        self.get_cart(owner_id).await
    }
}
