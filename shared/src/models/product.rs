//! Product catalog and inventory option models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A wholesale apparel product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    /// Unique product code (e.g., "AWP-TEE-0042")
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sellable (color, size) variant of a product and its stock counters.
///
/// Newer records split stock into `physical_stock` (total units owned) and
/// `allocated_stock` (units reserved against open orders). Older records
/// carry only the legacy `stock_quantity` scalar. When the split pair is
/// present it wins; otherwise the scalar is the available stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryOption {
    pub id: Uuid,
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
    pub physical_stock: Option<i64>,
    pub allocated_stock: Option<i64>,
    pub stock_quantity: Option<i64>,
}

impl InventoryOption {
    /// The stock bucket this option backs
    pub fn key(&self) -> VariantKey {
        VariantKey::new(self.product_id, &self.color, &self.size)
    }

    /// Whether this record uses the physical/allocated split
    pub fn uses_split_stock(&self) -> bool {
        self.physical_stock.is_some()
    }

    /// Units currently free to allocate
    pub fn available_stock(&self) -> i64 {
        match self.physical_stock {
            Some(physical) => (physical - self.allocated_stock.unwrap_or(0)).max(0),
            None => self.stock_quantity.unwrap_or(0).max(0),
        }
    }
}

/// Identifies one (product, color, size) stock bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
}

impl VariantKey {
    pub fn new(product_id: Uuid, color: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            product_id,
            color: color.into(),
            size: size.into(),
        }
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.product_id, self.color, self.size)
    }
}
