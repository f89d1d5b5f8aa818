//! Product catalog service: products and their (color, size) inventory options

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{InventoryOption, Product};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::{validate_product_code, validate_stock_count, validate_variant_label};

use crate::error::{AppError, AppResult};
use crate::services::allocation::{lock_products, reallocate_in_tx, AllocationSummary};

/// Product catalog service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Input for one inventory option.
///
/// New records should supply `physical_stock`; `stock_quantity` is accepted
/// for legacy imports that only know a single available count.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryOptionInput {
    pub color: String,
    pub size: String,
    pub physical_stock: Option<i64>,
    pub stock_quantity: Option<i64>,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<InventoryOptionInput>,
}

/// Input for updating a product's descriptive fields
#[derive(Debug, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A product together with its inventory options
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithOptions {
    #[serde(flatten)]
    pub product: Product,
    pub options: Vec<InventoryOption>,
}

/// Result of replacing a product's inventory
#[derive(Debug, Serialize)]
pub struct InventoryUpdateResult {
    pub options: Vec<InventoryOption>,
    pub allocation: AllocationSummary,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            code: row.code,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

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

impl From<OptionRow> for InventoryOption {
    fn from(row: OptionRow) -> Self {
        InventoryOption {
            id: row.id,
            product_id: row.product_id,
            color: row.color,
            size: row.size,
            physical_stock: row.physical_stock,
            allocated_stock: row.allocated_stock,
            stock_quantity: row.stock_quantity,
        }
    }
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a product with its initial inventory options
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<ProductWithOptions> {
        let code = input.code.trim().to_uppercase();
        validate_product_code(&code).map_err(|msg| AppError::Validation {
            field: "code".to_string(),
            message: msg.to_string(),
        })?;
        validate_options(&input.options)?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE code = $1)",
        )
        .bind(&code)
        .fetch_one(&self.db)
        .await?;
        if exists {
            return Err(AppError::DuplicateEntry("code".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let product = sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (code, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, code, name, description, created_at, updated_at
            "#,
        )
        .bind(&code)
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&mut *tx)
        .await?;

        for option in &input.options {
            insert_option(&mut tx, product.id, option).await?;
        }

        let options = fetch_options(&mut *tx, product.id).await?;
        tx.commit().await?;

        tracing::info!(code = %product.code, "product created");
        Ok(ProductWithOptions {
            product: product.into(),
            options,
        })
    }

    /// List products, newest first
    pub async fn list_products(
        &self,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Product>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, code, name, description, created_at, updated_at
            FROM products
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            pagination: PaginationMeta::new(&pagination, total as u64),
            data: rows.into_iter().map(Product::from).collect(),
        })
    }

    /// Get a product with its inventory options
    pub async fn get_product(&self, product_id: Uuid) -> AppResult<ProductWithOptions> {
        let product = self.fetch_product(product_id).await?;
        let options = fetch_options(&self.db, product_id).await?;
        Ok(ProductWithOptions { product, options })
    }

    /// Update a product's descriptive fields
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        let current = self.fetch_product(product_id).await?;
        let name = input.name.unwrap_or(current.name);
        let description = input.description.or(current.description);

        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            UPDATE products
            SET name = $1, description = $2, updated_at = now()
            WHERE id = $3
            RETURNING id, code, name, description, created_at, updated_at
            "#,
        )
        .bind(name.trim())
        .bind(&description)
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Get the inventory options for a product
    pub async fn get_inventory(&self, product_id: Uuid) -> AppResult<Vec<InventoryOption>> {
        self.fetch_product(product_id).await?;
        fetch_options(&self.db, product_id).await
    }

    /// Replace a product's inventory options and rerun allocation: new stock
    /// appearing (or disappearing) changes every competing order's grant
    pub async fn replace_inventory(
        &self,
        product_id: Uuid,
        options: Vec<InventoryOptionInput>,
    ) -> AppResult<InventoryUpdateResult> {
        self.fetch_product(product_id).await?;
        validate_options(&options)?;

        let mut tx = self.db.begin().await?;

        // Option rows and stale holds are mutated below, so the product lock
        // comes first, ahead of the pass that would otherwise take it
        lock_products(&mut tx, &[product_id]).await?;

        sqlx::query("DELETE FROM inventory_options WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        for option in &options {
            insert_option(&mut tx, product_id, option).await?;
        }

        // Old grants reference options that no longer exist; zero them so
        // the pass starts from the fresh counters instead of crediting
        // stale holds onto the new rows
        sqlx::query(
            r#"
            UPDATE order_line_items i
            SET allocated_quantity = 0
            FROM purchase_orders o
            WHERE i.order_id = o.id
              AND i.product_id = $1
              AND o.status IN ('pending', 'partially_allocated', 'fully_allocated')
            "#,
        )
        .bind(product_id)
        .execute(&mut *tx)
        .await?;

        let allocation = reallocate_in_tx(&mut tx, &[product_id]).await?;
        let options = fetch_options(&mut *tx, product_id).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product_id, "inventory replaced");
        Ok(InventoryUpdateResult { options, allocation })
    }

    async fn fetch_product(&self, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, code, name, description, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .map(Product::from)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }
}

fn validate_options(options: &[InventoryOptionInput]) -> AppResult<()> {
    for (index, option) in options.iter().enumerate() {
        validate_variant_label(&option.color).map_err(|msg| AppError::Validation {
            field: format!("options[{}].color", index),
            message: msg.to_string(),
        })?;
        validate_variant_label(&option.size).map_err(|msg| AppError::Validation {
            field: format!("options[{}].size", index),
            message: msg.to_string(),
        })?;
        let stock = option.physical_stock.or(option.stock_quantity).unwrap_or(0);
        validate_stock_count(stock).map_err(|msg| AppError::Validation {
            field: format!("options[{}]", index),
            message: msg.to_string(),
        })?;
    }

    // Reject duplicate (color, size) pairs within one payload
    for (i, a) in options.iter().enumerate() {
        for b in options.iter().skip(i + 1) {
            if a.color.trim().eq_ignore_ascii_case(b.color.trim())
                && a.size.trim().eq_ignore_ascii_case(b.size.trim())
            {
                return Err(AppError::Validation {
                    field: "options".to_string(),
                    message: format!("Duplicate option {}/{}", a.color.trim(), a.size.trim()),
                });
            }
        }
    }
    Ok(())
}

async fn insert_option(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: Uuid,
    option: &InventoryOptionInput,
) -> AppResult<()> {
    // Split-stock records start with nothing reserved; legacy records carry
    // only the scalar
    let (physical, allocated, legacy) = match option.physical_stock {
        Some(physical) => (Some(physical), Some(0i64), None),
        None => (None, None, Some(option.stock_quantity.unwrap_or(0))),
    };

    sqlx::query(
        r#"
        INSERT INTO inventory_options (product_id, color, size, physical_stock, allocated_stock, stock_quantity)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(product_id)
    .bind(option.color.trim())
    .bind(option.size.trim())
    .bind(physical)
    .bind(allocated)
    .bind(legacy)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn fetch_options<'e, E>(executor: E, product_id: Uuid) -> AppResult<Vec<InventoryOption>>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let rows = sqlx::query_as::<_, OptionRow>(
        r#"
        SELECT id, product_id, color, size, physical_stock, allocated_stock, stock_quantity
        FROM inventory_options
        WHERE product_id = $1
        ORDER BY color, size
        "#,
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(InventoryOption::from).collect())
}
