//! Allocation engine tests
//!
//! Tests for FIFO inventory allocation including:
//! - Conservation: grants never exceed available stock
//! - FIFO priority: older orders are satisfied before younger ones
//! - Bounds: every grant stays within the requested quantity
//! - Idempotence: rerunning a pass without new demand changes nothing

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use shared::allocation::{allocate, reallocate, restore, AllocationItem, AllocationOrder, StockPool};
use shared::models::{OrderStatus, VariantKey};

fn ts(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

fn single_key() -> VariantKey {
    VariantKey::new(Uuid::nil(), "black", "M")
}

fn order(created: i64, key: &VariantKey, quantity: i64) -> AllocationOrder {
    AllocationOrder {
        order_id: Uuid::new_v4(),
        created_at: ts(created),
        items: vec![AllocationItem {
            item_id: Uuid::new_v4(),
            key: key.clone(),
            quantity,
            allocated: 0,
        }],
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Older order drains stock before the younger sees any
    #[test]
    fn test_fifo_priority_exhausts_older_first() {
        let key = single_key();
        let mut pool = StockPool::new();
        pool.set(key.clone(), 5);

        let mut orders = vec![order(1, &key, 8), order(2, &key, 3)];
        allocate(&mut pool, &mut orders);

        assert_eq!(orders[0].items[0].allocated, 5);
        assert_eq!(orders[1].items[0].allocated, 0);
    }

    /// Restore returns grants to the pool and zeroes the working set
    #[test]
    fn test_restore_rebuilds_baseline() {
        let key = single_key();
        let mut pool = StockPool::new();
        pool.set(key.clone(), 2);

        let mut orders = vec![AllocationOrder {
            order_id: Uuid::new_v4(),
            created_at: ts(1),
            items: vec![AllocationItem {
                item_id: Uuid::new_v4(),
                key: key.clone(),
                quantity: 6,
                allocated: 6,
            }],
        }];
        restore(&mut pool, &mut orders);

        assert_eq!(pool.available(&key), Some(8));
        assert_eq!(orders[0].items[0].allocated, 0);
    }

    /// A younger order's grant shrinks when an older order arrives late
    #[test]
    fn test_reallocation_can_reduce_prior_grant() {
        let key = single_key();
        let mut pool = StockPool::new();
        pool.set(key.clone(), 4); // 10 physical, 6 already held by A

        let mut a = order(5, &key, 6);
        a.items[0].allocated = 6;
        let c = order(2, &key, 8);

        let mut orders = vec![a, c];
        reallocate(&mut pool, &mut orders);

        // Sorted oldest first: C gets 8, A is squeezed to 2
        assert_eq!(orders[0].created_at, ts(2));
        assert_eq!(orders[0].items[0].allocated, 8);
        assert_eq!(orders[1].items[0].allocated, 2);
    }

    /// Status follows the grants: nothing, some, all
    #[test]
    fn test_status_tracks_allocation_level() {
        let key = single_key();
        let mut pool = StockPool::new();
        pool.set(key.clone(), 6);

        let mut orders = vec![order(1, &key, 6), order(2, &key, 4), order(3, &key, 2)];
        allocate(&mut pool, &mut orders);

        assert_eq!(orders[0].status(), OrderStatus::FullyAllocated);
        assert_eq!(orders[1].status(), OrderStatus::Pending);
        assert_eq!(orders[2].status(), OrderStatus::Pending);
    }

    /// Partial grants are allowed per line, not per order
    #[test]
    fn test_partial_grant_within_order() {
        let product = Uuid::new_v4();
        let red = VariantKey::new(product, "red", "L");
        let blue = VariantKey::new(product, "blue", "L");
        let mut pool = StockPool::new();
        pool.set(red.clone(), 10);
        pool.set(blue.clone(), 1);

        let mut orders = vec![AllocationOrder {
            order_id: Uuid::new_v4(),
            created_at: ts(1),
            items: vec![
                AllocationItem {
                    item_id: Uuid::new_v4(),
                    key: red.clone(),
                    quantity: 4,
                    allocated: 0,
                },
                AllocationItem {
                    item_id: Uuid::new_v4(),
                    key: blue.clone(),
                    quantity: 4,
                    allocated: 0,
                },
            ],
        }];
        allocate(&mut pool, &mut orders);

        assert_eq!(orders[0].items[0].allocated, 4);
        assert_eq!(orders[0].items[1].allocated, 1);
        assert_eq!(orders[0].status(), OrderStatus::PartiallyAllocated);
    }

    /// Empty pool grants nothing but never fails
    #[test]
    fn test_empty_pool_grants_nothing() {
        let key = single_key();
        let mut pool = StockPool::new();

        let mut orders = vec![order(1, &key, 5)];
        reallocate(&mut pool, &mut orders);

        assert_eq!(orders[0].items[0].allocated, 0);
        assert_eq!(orders[0].status(), OrderStatus::Pending);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for available stock per key
    fn stock_strategy() -> impl Strategy<Value = i64> {
        0i64..=60
    }

    /// Strategy for a batch of competing order quantities
    fn demand_strategy() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(0i64..=30, 1..8)
    }

    fn build_orders(key: &VariantKey, demands: &[i64]) -> Vec<AllocationOrder> {
        demands
            .iter()
            .enumerate()
            .map(|(index, &quantity)| order(index as i64 + 1, key, quantity))
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property 1: Conservation
        /// Total granted never exceeds the available stock for the key
        #[test]
        fn prop_conservation(stock in stock_strategy(), demands in demand_strategy()) {
            let key = single_key();
            let mut pool = StockPool::new();
            pool.set(key.clone(), stock);

            let mut orders = build_orders(&key, &demands);
            reallocate(&mut pool, &mut orders);

            let granted: i64 = orders
                .iter()
                .flat_map(|o| o.items.iter().map(|i| i.allocated))
                .sum();
            prop_assert!(granted <= stock);

            // Remaining stock accounts for every granted unit
            prop_assert_eq!(pool.available(&key).unwrap_or(0), stock - granted);
        }

        /// Property 2: FIFO priority
        /// If the older order is not fully satisfied, the younger gets nothing
        #[test]
        fn prop_fifo_priority(
            stock in stock_strategy(),
            older in 1i64..=30,
            younger in 1i64..=30
        ) {
            let key = single_key();
            let mut pool = StockPool::new();
            pool.set(key.clone(), stock);

            let mut orders = vec![order(1, &key, older), order(2, &key, younger)];
            reallocate(&mut pool, &mut orders);

            if stock < older {
                prop_assert_eq!(orders[0].items[0].allocated, stock.max(0));
                prop_assert_eq!(orders[1].items[0].allocated, 0);
            } else {
                prop_assert_eq!(orders[0].items[0].allocated, older);
            }
        }

        /// Property 3: Bounds
        /// Every grant satisfies 0 <= allocated <= quantity
        #[test]
        fn prop_grant_bounds(stock in stock_strategy(), demands in demand_strategy()) {
            let key = single_key();
            let mut pool = StockPool::new();
            pool.set(key.clone(), stock);

            let mut orders = build_orders(&key, &demands);
            reallocate(&mut pool, &mut orders);

            for order in &orders {
                for item in &order.items {
                    prop_assert!(item.allocated >= 0);
                    prop_assert!(item.allocated <= item.quantity.max(0));
                }
            }
        }

        /// Property 4: Idempotence
        /// Rerunning the pass without new demand yields identical grants
        #[test]
        fn prop_idempotent(stock in stock_strategy(), demands in demand_strategy()) {
            let key = single_key();
            let mut pool = StockPool::new();
            pool.set(key.clone(), stock);

            let mut orders = build_orders(&key, &demands);
            reallocate(&mut pool, &mut orders);
            let first: Vec<i64> = orders
                .iter()
                .flat_map(|o| o.items.iter().map(|i| i.allocated))
                .collect();
            let remaining = pool.available(&key);

            reallocate(&mut pool, &mut orders);
            let second: Vec<i64> = orders
                .iter()
                .flat_map(|o| o.items.iter().map(|i| i.allocated))
                .collect();

            prop_assert_eq!(first, second);
            prop_assert_eq!(pool.available(&key), remaining);
        }

        /// Conservation holds per key when orders span multiple variants
        #[test]
        fn prop_conservation_multi_key(
            stock_a in stock_strategy(),
            stock_b in stock_strategy(),
            demands in prop::collection::vec((0i64..=20, 0i64..=20), 1..6)
        ) {
            let product = Uuid::nil();
            let key_a = VariantKey::new(product, "black", "M");
            let key_b = VariantKey::new(product, "white", "L");
            let mut pool = StockPool::new();
            pool.set(key_a.clone(), stock_a);
            pool.set(key_b.clone(), stock_b);

            let mut orders: Vec<AllocationOrder> = demands
                .iter()
                .enumerate()
                .map(|(index, &(qty_a, qty_b))| AllocationOrder {
                    order_id: Uuid::new_v4(),
                    created_at: ts(index as i64 + 1),
                    items: vec![
                        AllocationItem {
                            item_id: Uuid::new_v4(),
                            key: key_a.clone(),
                            quantity: qty_a,
                            allocated: 0,
                        },
                        AllocationItem {
                            item_id: Uuid::new_v4(),
                            key: key_b.clone(),
                            quantity: qty_b,
                            allocated: 0,
                        },
                    ],
                })
                .collect();
            reallocate(&mut pool, &mut orders);

            let granted_a: i64 = orders
                .iter()
                .flat_map(|o| o.items.iter())
                .filter(|i| i.key == key_a)
                .map(|i| i.allocated)
                .sum();
            let granted_b: i64 = orders
                .iter()
                .flat_map(|o| o.items.iter())
                .filter(|i| i.key == key_b)
                .map(|i| i.allocated)
                .sum();

            prop_assert!(granted_a <= stock_a);
            prop_assert!(granted_b <= stock_b);
        }

        /// Restoring prior grants never manufactures stock: after a
        /// restore-then-allocate cycle total units (granted + remaining)
        /// equal the baseline
        #[test]
        fn prop_restore_conserves_units(
            stock in stock_strategy(),
            demands in demand_strategy()
        ) {
            let key = single_key();
            let mut pool = StockPool::new();
            pool.set(key.clone(), stock);

            let mut orders = build_orders(&key, &demands);
            reallocate(&mut pool, &mut orders);

            // Second cycle against the mutated pool
            reallocate(&mut pool, &mut orders);

            let granted: i64 = orders
                .iter()
                .flat_map(|o| o.items.iter().map(|i| i.allocated))
                .sum();
            prop_assert_eq!(granted + pool.available(&key).unwrap_or(0), stock);
        }
    }
}
