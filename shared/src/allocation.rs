//! FIFO inventory allocation engine
//!
//! Allocation is not incremental. Orders can be edited and older orders can
//! arrive late, so every pass discards the previous allocation for the
//! affected stock buckets ([`restore`]) and regrants everything strictly
//! oldest-order-first ([`allocate`]). The working set is owned by the pass:
//! the caller builds a [`StockPool`] and a slice of [`AllocationOrder`]s,
//! runs [`reallocate`], and persists the mutated values in one transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{InventoryOption, OrderStatus, VariantKey};

/// Available stock per variant for one allocation pass
#[derive(Debug, Clone, Default)]
pub struct StockPool {
    available: HashMap<VariantKey, i64>,
}

impl StockPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from inventory options, using each option's available
    /// stock (physical minus allocated, or the legacy scalar)
    pub fn from_options<'a, I>(options: I) -> Self
    where
        I: IntoIterator<Item = &'a InventoryOption>,
    {
        let mut pool = Self::new();
        for option in options {
            pool.set(option.key(), option.available_stock());
        }
        pool
    }

    /// Set the available units for a variant, clamped at zero
    pub fn set(&mut self, key: VariantKey, available: i64) {
        self.available.insert(key, available.max(0));
    }

    /// Available units for a variant, or `None` if the variant is unknown
    pub fn available(&self, key: &VariantKey) -> Option<i64> {
        self.available.get(key).copied()
    }

    /// Return units to a known variant. Unknown variants are ignored: a
    /// historical line may reference an option that no longer exists.
    fn credit(&mut self, key: &VariantKey, units: i64) {
        if let Some(available) = self.available.get_mut(key) {
            *available += units;
        }
    }

    fn debit(&mut self, key: &VariantKey, units: i64) {
        if let Some(available) = self.available.get_mut(key) {
            *available = (*available - units).max(0);
        }
    }

    pub fn total_available(&self) -> i64 {
        self.available.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariantKey, i64)> {
        self.available.iter().map(|(k, v)| (k, *v))
    }
}

/// One order competing for stock in an allocation pass
#[derive(Debug, Clone)]
pub struct AllocationOrder {
    pub order_id: Uuid,
    /// FIFO sort key
    pub created_at: DateTime<Utc>,
    pub items: Vec<AllocationItem>,
}

impl AllocationOrder {
    /// Allocation status derived from the current item grants
    pub fn status(&self) -> OrderStatus {
        OrderStatus::derive(self.items.iter().map(|i| (i.allocated, i.quantity)))
    }
}

/// One line item in the working set
#[derive(Debug, Clone)]
pub struct AllocationItem {
    pub item_id: Uuid,
    pub key: VariantKey,
    pub quantity: i64,
    pub allocated: i64,
}

/// Return every previously granted unit to the pool and zero all grants,
/// producing the clean baseline the FIFO pass starts from.
///
/// Grants against variants missing from the pool are dropped silently; the
/// option was reconfigured away and the units no longer exist to return.
pub fn restore(pool: &mut StockPool, orders: &mut [AllocationOrder]) {
    for order in orders.iter_mut() {
        for item in order.items.iter_mut() {
            if item.allocated > 0 {
                pool.credit(&item.key, item.allocated);
            }
            item.allocated = 0;
        }
    }
}

/// Grant stock strictly oldest-order-first.
///
/// Orders are sorted by creation time (stable, so equal timestamps keep
/// their input order). Each positive-quantity line receives
/// `min(quantity, available)`; an older order exhausts a variant before a
/// younger order sees any of it. Lines whose variant is not in the pool
/// receive nothing.
pub fn allocate(pool: &mut StockPool, orders: &mut [AllocationOrder]) {
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    for order in orders.iter_mut() {
        for item in order.items.iter_mut() {
            if item.quantity <= 0 {
                item.allocated = 0;
                continue;
            }
            let available = pool.available(&item.key).unwrap_or(0);
            let grant = item.quantity.min(available).max(0);
            if grant > 0 {
                pool.debit(&item.key, grant);
            }
            item.allocated = grant;
        }
    }
}

/// One full allocation pass: restore to baseline, then regrant in FIFO order
pub fn reallocate(pool: &mut StockPool, orders: &mut [AllocationOrder]) {
    restore(pool, orders);
    allocate(pool, orders);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn key(product_id: Uuid, color: &str, size: &str) -> VariantKey {
        VariantKey::new(product_id, color, size)
    }

    fn order(created: i64, items: Vec<AllocationItem>) -> AllocationOrder {
        AllocationOrder {
            order_id: Uuid::new_v4(),
            created_at: ts(created),
            items,
        }
    }

    fn item(key: VariantKey, quantity: i64, allocated: i64) -> AllocationItem {
        AllocationItem {
            item_id: Uuid::new_v4(),
            key,
            quantity,
            allocated,
        }
    }

    /// Single key, stock 10; A(t=1) wants 6, B(t=2) wants 8
    #[test]
    fn test_fifo_split_across_two_orders() {
        let product = Uuid::new_v4();
        let k = key(product, "black", "M");
        let mut pool = StockPool::new();
        pool.set(k.clone(), 10);

        let mut orders = vec![
            order(1, vec![item(k.clone(), 6, 0)]),
            order(2, vec![item(k.clone(), 8, 0)]),
        ];
        reallocate(&mut pool, &mut orders);

        assert_eq!(orders[0].items[0].allocated, 6);
        assert_eq!(orders[1].items[0].allocated, 4);
        assert_eq!(pool.available(&k), Some(0));
        assert_eq!(orders[0].status(), OrderStatus::FullyAllocated);
        assert_eq!(orders[1].status(), OrderStatus::PartiallyAllocated);
    }

    /// Stock 5; A wants 3, then is edited to want 5 and the pass reruns
    #[test]
    fn test_edit_rerun_restores_then_regrants() {
        let product = Uuid::new_v4();
        let k = key(product, "navy", "L");
        let mut pool = StockPool::new();
        pool.set(k.clone(), 5);

        let mut orders = vec![order(1, vec![item(k.clone(), 3, 0)])];
        reallocate(&mut pool, &mut orders);
        assert_eq!(orders[0].items[0].allocated, 3);
        assert_eq!(pool.available(&k), Some(2));

        // Edit: same order now wants 5. Rebuild the pass from the mutated
        // pool; restore returns the held 3 before regranting.
        orders[0].items[0].quantity = 5;
        reallocate(&mut pool, &mut orders);
        assert_eq!(orders[0].items[0].allocated, 5);
        assert_eq!(pool.available(&k), Some(0));
    }

    /// Two colors of one product: Red=4, Blue=4; one order wants Red:3, Blue:5
    #[test]
    fn test_per_variant_clamping_within_one_order() {
        let product = Uuid::new_v4();
        let red = key(product, "red", "M");
        let blue = key(product, "blue", "M");
        let mut pool = StockPool::new();
        pool.set(red.clone(), 4);
        pool.set(blue.clone(), 4);

        let mut orders = vec![order(
            1,
            vec![item(red.clone(), 3, 0), item(blue.clone(), 5, 0)],
        )];
        reallocate(&mut pool, &mut orders);

        assert_eq!(orders[0].items[0].allocated, 3);
        assert_eq!(orders[0].items[1].allocated, 4);
        assert_eq!(pool.available(&red), Some(1));
        assert_eq!(pool.available(&blue), Some(0));
        assert_eq!(orders[0].status(), OrderStatus::PartiallyAllocated);
    }

    /// A line referencing a variant with no inventory data gets nothing
    #[test]
    fn test_missing_option_grants_zero() {
        let product = Uuid::new_v4();
        let unknown = key(product, "ghost", "XXL");
        let mut pool = StockPool::new();

        let mut orders = vec![order(1, vec![item(unknown.clone(), 4, 0)])];
        reallocate(&mut pool, &mut orders);

        assert_eq!(orders[0].items[0].allocated, 0);
        assert_eq!(orders[0].status(), OrderStatus::Pending);
    }

    /// A held 6 of stock 10; C (earlier timestamp) arrives late wanting 8.
    /// After restore the pool is back to 10 and C is served first.
    #[test]
    fn test_late_arriving_earlier_order_preempts() {
        let product = Uuid::new_v4();
        let k = key(product, "white", "S");
        let mut pool = StockPool::new();
        // A's prior grant of 6 already deducted: 10 - 6 = 4 available
        pool.set(k.clone(), 4);

        let mut orders = vec![
            order(5, vec![item(k.clone(), 6, 6)]),
            order(2, vec![item(k.clone(), 8, 0)]),
        ];
        reallocate(&mut pool, &mut orders);

        // Orders are now sorted oldest first: C then A
        assert_eq!(orders[0].created_at, ts(2));
        assert_eq!(orders[0].items[0].allocated, 8);
        assert_eq!(orders[1].items[0].allocated, 2);
        assert_eq!(pool.available(&k), Some(0));
    }

    /// Restoring a grant whose option was deleted must not fail or
    /// resurrect stock elsewhere
    #[test]
    fn test_restore_skips_deleted_option() {
        let product = Uuid::new_v4();
        let kept = key(product, "black", "M");
        let deleted = key(product, "beige", "M");
        let mut pool = StockPool::new();
        pool.set(kept.clone(), 2);

        let mut orders = vec![order(
            1,
            vec![item(kept.clone(), 2, 2), item(deleted.clone(), 3, 3)],
        )];
        reallocate(&mut pool, &mut orders);

        assert_eq!(orders[0].items[0].allocated, 2);
        assert_eq!(orders[0].items[1].allocated, 0);
        assert_eq!(pool.total_available(), 0);
    }

    /// Running the pass twice with no changes yields identical results
    #[test]
    fn test_idempotent_without_new_demand() {
        let product = Uuid::new_v4();
        let k = key(product, "olive", "M");
        let mut pool = StockPool::new();
        pool.set(k.clone(), 7);

        let mut orders = vec![
            order(1, vec![item(k.clone(), 5, 0)]),
            order(2, vec![item(k.clone(), 5, 0)]),
        ];
        reallocate(&mut pool, &mut orders);
        let first: Vec<i64> = orders
            .iter()
            .flat_map(|o| o.items.iter().map(|i| i.allocated))
            .collect();
        let first_remaining = pool.available(&k);

        reallocate(&mut pool, &mut orders);
        let second: Vec<i64> = orders
            .iter()
            .flat_map(|o| o.items.iter().map(|i| i.allocated))
            .collect();

        assert_eq!(first, second);
        assert_eq!(pool.available(&k), first_remaining);
    }

    /// Equal timestamps keep their input order (stable sort)
    #[test]
    fn test_timestamp_ties_are_stable() {
        let product = Uuid::new_v4();
        let k = key(product, "grey", "M");
        let mut pool = StockPool::new();
        pool.set(k.clone(), 3);

        let first_id = Uuid::new_v4();
        let mut orders = vec![
            AllocationOrder {
                order_id: first_id,
                created_at: ts(1),
                items: vec![item(k.clone(), 3, 0)],
            },
            order(1, vec![item(k.clone(), 3, 0)]),
        ];
        reallocate(&mut pool, &mut orders);

        assert_eq!(orders[0].order_id, first_id);
        assert_eq!(orders[0].items[0].allocated, 3);
        assert_eq!(orders[1].items[0].allocated, 0);
    }

    /// A grant is credited back exactly once: the first restore zeroes the
    /// working set, so repeating it must not inflate the pool
    #[test]
    fn test_restore_credits_each_hold_once() {
        let product = Uuid::new_v4();
        let k = key(product, "charcoal", "L");
        let mut pool = StockPool::new();
        pool.set(k.clone(), 1);

        let mut orders = vec![order(1, vec![item(k.clone(), 5, 5)])];
        restore(&mut pool, &mut orders);
        assert_eq!(pool.available(&k), Some(6));
        assert_eq!(orders[0].items[0].allocated, 0);

        restore(&mut pool, &mut orders);
        assert_eq!(pool.available(&k), Some(6));
    }

    #[test]
    fn test_zero_and_negative_quantities_get_nothing() {
        let product = Uuid::new_v4();
        let k = key(product, "black", "S");
        let mut pool = StockPool::new();
        pool.set(k.clone(), 5);

        let mut orders = vec![order(
            1,
            vec![item(k.clone(), 0, 0), item(k.clone(), -2, 0)],
        )];
        reallocate(&mut pool, &mut orders);

        assert_eq!(orders[0].items[0].allocated, 0);
        assert_eq!(orders[0].items[1].allocated, 0);
        assert_eq!(pool.available(&k), Some(5));
    }
}
