//! Inventory allocation service
//!
//! Runs the full demand-collect / restore / FIFO-reallocate pass for a set of
//! touched products and persists the result. The whole pass executes inside
//! one database transaction, serialized against overlapping passes with
//! per-product advisory locks, so a failure rolls everything back instead of
//! leaving mixed state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::allocation::{reallocate, AllocationItem, AllocationOrder, StockPool};
use shared::models::{InventoryOption, VariantKey};

use crate::error::AppResult;

/// Allocation service driving reallocation passes
#[derive(Clone)]
pub struct AllocationService {
    db: PgPool,
}

/// Outcome of one allocation pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllocationSummary {
    pub orders_processed: usize,
    pub units_allocated: i64,
}

/// Inventory option row in the working set
#[derive(Debug, FromRow)]
struct OptionRow {
    id: Uuid,
    product_id: Uuid,
    color: String,
    size: String,
    physical_stock: Option<i64>,
    allocated_stock: Option<i64>,
    stock_quantity: Option<i64>,
}

impl OptionRow {
    fn as_model(&self) -> InventoryOption {
        InventoryOption {
            id: self.id,
            product_id: self.product_id,
            color: self.color.clone(),
            size: self.size.clone(),
            physical_stock: self.physical_stock,
            allocated_stock: self.allocated_stock,
            stock_quantity: self.stock_quantity,
        }
    }
}

#[derive(Debug, FromRow)]
struct OpenOrderRow {
    id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OpenItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    color: String,
    size: String,
    quantity: i64,
    allocated_quantity: i64,
}

impl AllocationService {
    /// Create a new AllocationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Run one allocation pass for the given products in its own transaction
    pub async fn reallocate_products(&self, product_ids: &[Uuid]) -> AppResult<AllocationSummary> {
        let mut tx = self.db.begin().await?;
        let summary = reallocate_in_tx(&mut tx, product_ids).await?;
        tx.commit().await?;
        Ok(summary)
    }
}

/// Run one allocation pass inside an existing transaction.
///
/// The order set is every unresolved purchase order demanding stock in the
/// touched products; the working set then widens to every product those
/// orders reference so each order's status is derived from all of its items.
/// Holds of orders outside the set stay accounted for because availability is
/// physical minus allocated.
pub(crate) async fn reallocate_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    product_ids: &[Uuid],
) -> AppResult<AllocationSummary> {
    let mut touched: Vec<Uuid> = product_ids.to_vec();
    touched.sort();
    touched.dedup();

    if touched.is_empty() {
        return Ok(AllocationSummary::default());
    }

    // Lock the touched products, collect demand, then widen the lock set to
    // every product the collected orders reference. An order committed after
    // a scan can reference products outside the current set, so the loop
    // re-scans under the new locks and repeats until the set stops growing.
    // Every variant the pass restores or grants is then both locked and
    // loaded below.
    let mut products = touched.clone();
    lock_products(tx, &products).await?;
    let order_ids = loop {
        let order_ids = collect_demand_order_ids(tx, &touched).await?;
        if order_ids.is_empty() {
            break order_ids;
        }
        let referenced = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT product_id FROM order_line_items WHERE order_id = ANY($1)",
        )
        .bind(&order_ids)
        .fetch_all(&mut **tx)
        .await?;
        match widen(&products, referenced) {
            Some(grown) => {
                products = grown;
                lock_products(tx, &products).await?;
            }
            None => break order_ids,
        }
    };

    let options = sqlx::query_as::<_, OptionRow>(
        r#"
        SELECT id, product_id, color, size, physical_stock, allocated_stock, stock_quantity
        FROM inventory_options
        WHERE product_id = ANY($1)
        FOR UPDATE
        "#,
    )
    .bind(&products)
    .fetch_all(&mut **tx)
    .await?;

    let orders = sqlx::query_as::<_, OpenOrderRow>(
        r#"
        SELECT id, created_at
        FROM purchase_orders
        WHERE id = ANY($1)
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(&order_ids)
    .fetch_all(&mut **tx)
    .await?;

    let items = sqlx::query_as::<_, OpenItemRow>(
        r#"
        SELECT id, order_id, product_id, color, size, quantity, allocated_quantity
        FROM order_line_items
        WHERE order_id = ANY($1)
        ORDER BY order_id, id
        "#,
    )
    .bind(&order_ids)
    .fetch_all(&mut **tx)
    .await?;

    // Build the working set owned by this pass
    let option_models: Vec<InventoryOption> = options.iter().map(OptionRow::as_model).collect();
    let mut pool = StockPool::from_options(&option_models);

    let mut working: Vec<AllocationOrder> = orders
        .iter()
        .map(|o| AllocationOrder {
            order_id: o.id,
            created_at: o.created_at,
            items: Vec::new(),
        })
        .collect();
    for item in &items {
        if let Some(order) = working.iter_mut().find(|o| o.order_id == item.order_id) {
            order.items.push(AllocationItem {
                item_id: item.id,
                key: VariantKey::new(item.product_id, &item.color, &item.size),
                quantity: item.quantity,
                allocated: item.allocated_quantity,
            });
        }
    }

    // Restore to baseline, regrant in FIFO order
    reallocate(&mut pool, &mut working);

    // Persist item grants
    let mut units_allocated = 0i64;
    for order in &working {
        for item in &order.items {
            units_allocated += item.allocated;
            sqlx::query("UPDATE order_line_items SET allocated_quantity = $1 WHERE id = $2")
                .bind(item.allocated)
                .bind(item.item_id)
                .execute(&mut **tx)
                .await?;
        }
    }

    // Persist remaining stock per option. Split-stock rows keep their
    // physical count and carry the reservation in allocated_stock; legacy
    // rows write the remaining availability back into the scalar.
    for option in &options {
        let key = VariantKey::new(option.product_id, &option.color, &option.size);
        let remaining = pool.available(&key).unwrap_or(0);

        if let Some(physical) = option.physical_stock {
            let allocated = (physical - remaining).max(0);
            sqlx::query("UPDATE inventory_options SET allocated_stock = $1 WHERE id = $2")
                .bind(allocated)
                .bind(option.id)
                .execute(&mut **tx)
                .await?;
        } else {
            sqlx::query("UPDATE inventory_options SET stock_quantity = $1 WHERE id = $2")
                .bind(remaining)
                .bind(option.id)
                .execute(&mut **tx)
                .await?;
        }
    }

    // Persist derived order statuses
    for order in &working {
        sqlx::query("UPDATE purchase_orders SET status = $1, updated_at = now() WHERE id = $2")
            .bind(order.status().as_str())
            .bind(order.order_id)
            .execute(&mut **tx)
            .await?;
    }

    let summary = AllocationSummary {
        orders_processed: working.len(),
        units_allocated,
    };
    tracing::debug!(
        orders = summary.orders_processed,
        units = summary.units_allocated,
        "allocation pass complete"
    );

    Ok(summary)
}

/// Take the per-product advisory locks that serialize overlapping passes.
///
/// Ids are locked in sorted order. Every flow that mutates allocation holds
/// (release on edit/cancel, option replacement, shipment) must call this
/// before its first hold write, so the mutation happens inside the same
/// serialized section as the pass itself. Re-acquiring a lock already held
/// by this transaction succeeds immediately.
pub(crate) async fn lock_products(
    tx: &mut Transaction<'_, Postgres>,
    product_ids: &[Uuid],
) -> AppResult<()> {
    let mut ids = product_ids.to_vec();
    ids.sort();
    ids.dedup();

    for product_id in &ids {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(product_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Merge newly referenced product ids into the current sorted set. Returns
/// the grown set, or `None` when nothing new appeared.
fn widen(current: &[Uuid], referenced: Vec<Uuid>) -> Option<Vec<Uuid>> {
    let mut merged = current.to_vec();
    merged.extend(referenced);
    merged.sort();
    merged.dedup();

    if merged.len() > current.len() {
        Some(merged)
    } else {
        None
    }
}

/// Unresolved purchase orders with at least one line on the touched
/// products, oldest first
async fn collect_demand_order_ids(
    tx: &mut Transaction<'_, Postgres>,
    product_ids: &[Uuid],
) -> AppResult<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT o.id
        FROM purchase_orders o
        WHERE o.order_type = 'purchase'
          AND o.status IN ('pending', 'partially_allocated', 'fully_allocated')
          AND EXISTS (
              SELECT 1 FROM order_line_items i
              WHERE i.order_id = o.id AND i.product_id = ANY($1) AND i.quantity > 0
          )
        ORDER BY o.created_at ASC, o.id ASC
        "#,
    )
    .bind(product_ids)
    .fetch_all(&mut **tx)
    .await?;

    Ok(ids)
}
