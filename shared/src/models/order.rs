//! Purchase order models and order status derivation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::VariantKey;

/// A wholesale purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    /// Unique order number (e.g., "PO-2024-0001")
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// FIFO sort key for allocation
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One requested (product, color, size) line on an order.
///
/// `allocated_quantity` is the reservation written by the allocator and is
/// recomputed on every allocation pass. `shipped_quantity` is written only
/// when a shipment is confirmed and never by allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
    pub quantity: i64,
    pub allocated_quantity: i64,
    pub shipped_quantity: i64,
    pub unit_price: Option<Decimal>,
}

impl OrderLineItem {
    /// The stock bucket this line draws from
    pub fn key(&self) -> VariantKey {
        VariantKey::new(self.product_id, &self.color, &self.size)
    }

    pub fn is_fully_allocated(&self) -> bool {
        self.allocated_quantity >= self.quantity
    }
}

/// Type of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Purchase,
    Return,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Purchase => "purchase",
            OrderType::Return => "return",
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(OrderType::Purchase),
            "return" => Ok(OrderType::Return),
            other => Err(format!("unknown order type: {other}")),
        }
    }
}

/// Status of a purchase order.
///
/// The allocation states are explicit: `PartiallyAllocated` and
/// `FullyAllocated` are distinct variants, and [`OrderPhase`] collapses them
/// for presentation. `Shipped`, `Confirmed` and `Cancelled` are terminal and
/// reached only through the shipment/cancellation flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PartiallyAllocated,
    FullyAllocated,
    Shipped,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PartiallyAllocated => "partially_allocated",
            OrderStatus::FullyAllocated => "fully_allocated",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether this order still competes for stock in allocation passes
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::PartiallyAllocated | OrderStatus::FullyAllocated
        )
    }

    /// Presentation-level collapse of the allocation states
    pub fn phase(&self) -> OrderPhase {
        match self {
            OrderStatus::Pending => OrderPhase::Pending,
            OrderStatus::PartiallyAllocated | OrderStatus::FullyAllocated => OrderPhase::Processing,
            OrderStatus::Shipped | OrderStatus::Confirmed | OrderStatus::Cancelled => {
                OrderPhase::Closed
            }
        }
    }

    /// Derive the allocation status of an order from its line items as
    /// `(allocated_quantity, quantity)` pairs. Lines with no requested
    /// quantity are ignored; an order with nothing requested is `Pending`.
    pub fn derive<I>(items: I) -> OrderStatus
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let mut any_requested = false;
        let mut any_allocated = false;
        let mut all_full = true;

        for (allocated, quantity) in items {
            if quantity <= 0 {
                continue;
            }
            any_requested = true;
            if allocated > 0 {
                any_allocated = true;
            }
            if allocated < quantity {
                all_full = false;
            }
        }

        if !any_requested {
            OrderStatus::Pending
        } else if all_full {
            OrderStatus::FullyAllocated
        } else if any_allocated {
            OrderStatus::PartiallyAllocated
        } else {
            OrderStatus::Pending
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "partially_allocated" => Ok(OrderStatus::PartiallyAllocated),
            "fully_allocated" => Ok(OrderStatus::FullyAllocated),
            "shipped" => Ok(OrderStatus::Shipped),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse order lifecycle phase used by listing endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPhase {
    Pending,
    Processing,
    Closed,
}

impl OrderPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPhase::Pending => "pending",
            OrderPhase::Processing => "processing",
            OrderPhase::Closed => "closed",
        }
    }
}

/// Generate an order number
pub fn generate_order_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, year, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_derive_no_allocation_is_pending() {
        let status = OrderStatus::derive(vec![(0, 5), (0, 3)]);
        assert_eq!(status, OrderStatus::Pending);
    }

    #[test]
    fn test_status_derive_partial() {
        let status = OrderStatus::derive(vec![(2, 5), (0, 3)]);
        assert_eq!(status, OrderStatus::PartiallyAllocated);
        assert_eq!(status.phase(), OrderPhase::Processing);
    }

    #[test]
    fn test_status_derive_full() {
        let status = OrderStatus::derive(vec![(5, 5), (3, 3)]);
        assert_eq!(status, OrderStatus::FullyAllocated);
        assert_eq!(status.phase(), OrderPhase::Processing);
    }

    #[test]
    fn test_status_derive_empty_order_is_pending() {
        assert_eq!(OrderStatus::derive(vec![]), OrderStatus::Pending);
        // Zero-quantity lines carry no demand
        assert_eq!(OrderStatus::derive(vec![(0, 0)]), OrderStatus::Pending);
    }

    #[test]
    fn test_unresolved_statuses() {
        assert!(OrderStatus::Pending.is_unresolved());
        assert!(OrderStatus::PartiallyAllocated.is_unresolved());
        assert!(OrderStatus::FullyAllocated.is_unresolved());
        assert!(!OrderStatus::Shipped.is_unresolved());
        assert!(!OrderStatus::Cancelled.is_unresolved());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::PartiallyAllocated,
            OrderStatus::FullyAllocated,
            OrderStatus::Shipped,
            OrderStatus::Confirmed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("unknown".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_generate_order_number() {
        assert_eq!(generate_order_number("PO", 2024, 17), "PO-2024-0017");
    }
}
