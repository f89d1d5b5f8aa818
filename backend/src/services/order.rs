//! Purchase order service: create, edit, cancel, and ship orders
//!
//! Every mutation that changes demand runs the allocation pass inside the
//! same transaction, so order rows, line items, option stock and derived
//! statuses always move together.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::models::{
    generate_order_number, OrderLineItem, OrderPhase, OrderStatus, OrderType, PurchaseOrder,
};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::{validate_line_quantity, validate_unit_price, validate_variant_label};

use crate::error::{AppError, AppResult};
use crate::services::allocation::{lock_products, reallocate_in_tx};

/// Purchase order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    number_prefix: String,
}

/// Input for one requested line on an order
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
}

/// Input for creating a purchase order
#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub order_type: Option<OrderType>,
    pub items: Vec<OrderItemInput>,
}

/// Input for editing an order's line items
#[derive(Debug, Deserialize)]
pub struct UpdateOrderInput {
    pub items: Vec<OrderItemInput>,
}

/// Filters for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
}

/// An order together with its line items and presentation phase
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub phase: OrderPhase,
    pub items: Vec<OrderLineItem>,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    order_type: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_model(self) -> AppResult<PurchaseOrder> {
        Ok(PurchaseOrder {
            id: self.id,
            order_number: self.order_number,
            order_type: self.order_type.parse().map_err(AppError::Internal)?,
            status: self.status.parse().map_err(AppError::Internal)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    color: String,
    size: String,
    quantity: i64,
    allocated_quantity: i64,
    shipped_quantity: i64,
    unit_price: Option<Decimal>,
}

impl From<ItemRow> for OrderLineItem {
    fn from(row: ItemRow) -> Self {
        OrderLineItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            color: row.color,
            size: row.size,
            quantity: row.quantity,
            allocated_quantity: row.allocated_quantity,
            shipped_quantity: row.shipped_quantity,
            unit_price: row.unit_price,
        }
    }
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool, number_prefix: String) -> Self {
        Self { db, number_prefix }
    }

    /// Create a purchase order and run the allocation pass over every open
    /// order competing for the touched products
    pub async fn create_order(&self, input: CreateOrderInput) -> AppResult<OrderWithItems> {
        let order_type = input.order_type.unwrap_or(OrderType::Purchase);
        validate_items(&input.items)?;
        self.ensure_products_exist(&input.items).await?;

        let mut tx = self.db.begin().await?;

        let order_number = self.next_order_number(&mut tx).await?;
        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO purchase_orders (order_number, order_type, status)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&order_number)
        .bind(order_type.as_str())
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        insert_items(&mut tx, order_id, &input.items).await?;

        // Returns never compete for stock; purchases trigger a pass
        if order_type == OrderType::Purchase {
            let product_ids = touched_product_ids(&input.items);
            reallocate_in_tx(&mut tx, &product_ids).await?;
        }

        let order = fetch_order_with_items(&mut tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(order_number = %order_number, "purchase order created");
        Ok(order)
    }

    /// Replace an order's line items and rerun allocation over the union of
    /// the old and new product sets
    pub async fn update_order(
        &self,
        order_id: Uuid,
        input: UpdateOrderInput,
    ) -> AppResult<OrderWithItems> {
        validate_items(&input.items)?;
        self.ensure_products_exist(&input.items).await?;

        let mut tx = self.db.begin().await?;

        // Row lock so two edits (or an edit and a cancel) of the same order
        // cannot both pass the status check
        let current = fetch_order_row_for_update(&mut tx, order_id).await?;
        let status: OrderStatus = current.status.parse().map_err(AppError::Internal)?;
        if !status.is_unresolved() {
            return Err(AppError::InvalidStateTransition(format!(
                "Order {} cannot be edited in status {}",
                current.order_number, status
            )));
        }

        let old_product_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT product_id FROM order_line_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        // Releasing the outgoing holds mutates option counters, so it must
        // happen under the same per-product locks the pass itself takes
        let mut product_ids = touched_product_ids(&input.items);
        product_ids.extend(old_product_ids);
        lock_products(&mut tx, &product_ids).await?;

        release_order_holds(&mut tx, order_id).await?;
        sqlx::query("DELETE FROM order_line_items WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, order_id, &input.items).await?;

        reallocate_in_tx(&mut tx, &product_ids).await?;

        let order = fetch_order_with_items(&mut tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, "purchase order updated");
        Ok(order)
    }

    /// Cancel an order, releasing its allocation back to the pool for the
    /// remaining open orders
    pub async fn cancel_order(&self, order_id: Uuid) -> AppResult<OrderWithItems> {
        let mut tx = self.db.begin().await?;

        // Row lock: a second concurrent cancel blocks here and then fails
        // the status check instead of releasing the holds again
        let current = fetch_order_row_for_update(&mut tx, order_id).await?;
        let status: OrderStatus = current.status.parse().map_err(AppError::Internal)?;
        if !status.is_unresolved() {
            return Err(AppError::InvalidStateTransition(format!(
                "Order {} cannot be cancelled in status {}",
                current.order_number, status
            )));
        }

        let product_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT product_id FROM order_line_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        lock_products(&mut tx, &product_ids).await?;
        release_order_holds(&mut tx, order_id).await?;
        sqlx::query("UPDATE purchase_orders SET status = $1, updated_at = now() WHERE id = $2")
            .bind(OrderStatus::Cancelled.as_str())
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        // The cancelled order is excluded by status; survivors regrant
        reallocate_in_tx(&mut tx, &product_ids).await?;

        let order = fetch_order_with_items(&mut tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, "purchase order cancelled");
        Ok(order)
    }

    /// Confirm shipment of an order's allocated units via the atomic
    /// stored procedure, which moves each line's allocation to shipped and
    /// decrements physical stock
    pub async fn confirm_shipment(&self, order_id: Uuid) -> AppResult<OrderWithItems> {
        let mut tx = self.db.begin().await?;

        // Row lock prevents a double shipment confirmation; the second
        // caller sees status shipped and is rejected
        let current = fetch_order_row_for_update(&mut tx, order_id).await?;
        let status: OrderStatus = current.status.parse().map_err(AppError::Internal)?;
        match status {
            OrderStatus::PartiallyAllocated | OrderStatus::FullyAllocated => {}
            other => {
                return Err(AppError::InvalidStateTransition(format!(
                    "Order {} cannot be shipped in status {}",
                    current.order_number, other
                )));
            }
        }

        // The procedure mutates option counters; take the product locks
        // first so it cannot interleave with a running pass
        let product_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT product_id FROM order_line_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;
        lock_products(&mut tx, &product_ids).await?;

        sqlx::query("SELECT confirm_order_shipment($1)")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        let order = fetch_order_with_items(&mut tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, "shipment confirmed");
        Ok(order)
    }

    /// Get an order with its line items
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<OrderWithItems> {
        let mut tx = self.db.begin().await?;
        let order = fetch_order_with_items(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// List orders, newest first, with optional status and date filters
    pub async fn list_orders(
        &self,
        pagination: Pagination,
        filter: OrderListFilter,
    ) -> AppResult<PaginatedResponse<PurchaseOrder>> {
        let status = filter.status.map(|s| s.as_str().to_string());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM purchase_orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::date IS NULL OR created_at >= $2)
              AND ($3::date IS NULL OR created_at < $3 + INTERVAL '1 day')
            "#,
        )
        .bind(&status)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, order_number, order_type, status, created_at, updated_at
            FROM purchase_orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::date IS NULL OR created_at >= $2)
              AND ($3::date IS NULL OR created_at < $3 + INTERVAL '1 day')
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&status)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(OrderRow::into_model)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            pagination: PaginationMeta::new(&pagination, total as u64),
            data,
        })
    }

    /// Next order number for the current year. The upsert against the
    /// per-year counter row takes its row lock, so concurrent creates draw
    /// distinct values.
    async fn next_order_number(&self, tx: &mut Transaction<'_, Postgres>) -> AppResult<String> {
        let year = Utc::now().year();
        let sequence = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO order_number_counters (year, last_value)
            VALUES ($1, 1)
            ON CONFLICT (year)
            DO UPDATE SET last_value = order_number_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(year)
        .fetch_one(&mut **tx)
        .await?;

        Ok(generate_order_number(&self.number_prefix, year, sequence))
    }

    /// Validate that every referenced product exists
    async fn ensure_products_exist(&self, items: &[OrderItemInput]) -> AppResult<()> {
        let mut ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        ids.sort();
        ids.dedup();

        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_one(&self.db)
        .await?;

        if found as usize != ids.len() {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }
}

/// Validate order input lines
fn validate_items(items: &[OrderItemInput]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::Validation {
            field: "items".to_string(),
            message: "Order must have at least one line item".to_string(),
        });
    }

    for (index, item) in items.iter().enumerate() {
        validate_line_quantity(item.quantity).map_err(|msg| AppError::Validation {
            field: format!("items[{}].quantity", index),
            message: msg.to_string(),
        })?;
        validate_variant_label(&item.color).map_err(|msg| AppError::Validation {
            field: format!("items[{}].color", index),
            message: msg.to_string(),
        })?;
        validate_variant_label(&item.size).map_err(|msg| AppError::Validation {
            field: format!("items[{}].size", index),
            message: msg.to_string(),
        })?;
        if let Some(price) = item.unit_price {
            validate_unit_price(price).map_err(|msg| AppError::Validation {
                field: format!("items[{}].unit_price", index),
                message: msg.to_string(),
            })?;
        }
    }
    Ok(())
}

fn touched_product_ids(items: &[OrderItemInput]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = items
        .iter()
        .filter(|i| i.quantity > 0)
        .map(|i| i.product_id)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    items: &[OrderItemInput],
) -> AppResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO order_line_items (order_id, product_id, color, size, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.color.trim())
        .bind(item.size.trim())
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Release the option-level reservation held by an order's items and zero
/// their allocations. Used before lines are deleted (edit) or the order
/// leaves the unresolved set (cancel), so holds never leak.
async fn release_order_holds(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> AppResult<()> {
    // Split-stock options carry the hold in allocated_stock
    sqlx::query(
        r#"
        UPDATE inventory_options o
        SET allocated_stock = GREATEST(o.allocated_stock - i.allocated_quantity, 0)
        FROM order_line_items i
        WHERE i.order_id = $1
          AND i.allocated_quantity > 0
          AND o.product_id = i.product_id AND o.color = i.color AND o.size = i.size
          AND o.physical_stock IS NOT NULL
        "#,
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;

    // Legacy options already had the hold deducted from the scalar
    sqlx::query(
        r#"
        UPDATE inventory_options o
        SET stock_quantity = COALESCE(o.stock_quantity, 0) + i.allocated_quantity
        FROM order_line_items i
        WHERE i.order_id = $1
          AND i.allocated_quantity > 0
          AND o.product_id = i.product_id AND o.color = i.color AND o.size = i.size
          AND o.physical_stock IS NULL
        "#,
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE order_line_items SET allocated_quantity = 0 WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

async fn fetch_order_row(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> AppResult<OrderRow> {
    sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT id, order_number, order_type, status, created_at, updated_at
        FROM purchase_orders
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

/// Fetch an order and take its row lock. Mutating flows read through this
/// so a concurrent mutation of the same order waits here and then sees the
/// committed status.
async fn fetch_order_row_for_update(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> AppResult<OrderRow> {
    sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT id, order_number, order_type, status, created_at, updated_at
        FROM purchase_orders
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

async fn fetch_order_with_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> AppResult<OrderWithItems> {
    let order = fetch_order_row(tx, order_id).await?.into_model()?;

    let items = sqlx::query_as::<_, ItemRow>(
        r#"
        SELECT id, order_id, product_id, color, size, quantity,
               allocated_quantity, shipped_quantity, unit_price
        FROM order_line_items
        WHERE order_id = $1
        ORDER BY id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?
    .into_iter()
    .map(OrderLineItem::from)
    .collect();

    Ok(OrderWithItems {
        phase: order.status.phase(),
        order,
        items,
    })
}
