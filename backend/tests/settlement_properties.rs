//! Settlement property-based tests
//!
//! Invariants of the settlement engine over generated delivery orders:
//! - Reconciliation: per-buyer settlements add up to the final settlement
//! - Partition: distribution percentages add up to one
//! - Idempotence: rollups are pure
//! - Batch rollups equal the sum over their orders

use chrono::NaiveDate;
use fertilizer_procurement_backend::services::settlement::{summarize_batch, summarize_order};
use fertilizer_procurement_backend::store::{BatchFilter, InMemoryStore, ProcurementStore};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{Allocation, Batch, DeliveryOrder, Distribution, ADVANCE_RATE, RETENTION_RATE};
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Quantity with up to 2 decimal places (0 to 5000.00)
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0..=500_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Unit rate in USD (0.01 to 900.00)
fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (1..=90_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Per-buyer records: allocated union quantities and delivered (quantity, shortage, over)
type BuyerRecords = (Vec<Decimal>, Vec<(Decimal, Decimal, Decimal)>);

fn buyer_strategy() -> impl Strategy<Value = BuyerRecords> {
    (
        prop::collection::vec(quantity_strategy(), 0..4),
        prop::collection::vec(
            (quantity_strategy(), quantity_strategy(), quantity_strategy()),
            1..4,
        ),
    )
}

fn build_order(batch: &mut Batch, buyers: &[BuyerRecords]) -> Uuid {
    let order = batch.add_delivery_order(DeliveryOrder::new(
        "MV Generated",
        "BL-GEN",
        NaiveDate::from_ymd_opt(2021, 4, 1).unwrap(),
    ));
    for (allocated, delivered) in buyers {
        let buyer = Uuid::new_v4();
        let allocation = allocated.iter().fold(Allocation::new(order.id, buyer), |a, q| {
            a.with_union(Uuid::new_v4(), Uuid::new_v4(), *q)
        });
        order.add_allocation(allocation).unwrap();

        let distribution = delivered
            .iter()
            .fold(Distribution::new(order.id, buyer), |d, (q, s, o)| {
                d.with_union(Uuid::new_v4(), Uuid::new_v4(), *q, *s, *o)
            });
        order.add_distribution(distribution).unwrap();
    }
    order.id
}

fn order_strategy() -> impl Strategy<Value = (Decimal, Vec<BuyerRecords>)> {
    (rate_strategy(), prop::collection::vec(buyer_strategy(), 1..6))
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Σ distributed settlement == final settlement, exactly
    #[test]
    fn test_settlement_reconciles((rate, buyers) in order_strategy()) {
        let mut batch = Batch::new("LOT P", "LC-P", Decimal::from(10_000), rate, 2021);
        build_order(&mut batch, &buyers);
        let order = &batch.delivery_orders[0];
        prop_assume!(order.delivered_retention().unwrap() > Decimal::ZERO);

        let total: Decimal = order
            .distributions
            .iter()
            .map(|d| d.distributed_settlement(order).unwrap())
            .sum();
        prop_assert_eq!(total, order.final_settlement().unwrap());
        prop_assert_eq!(order.total_distributed_amount().unwrap(), order.final_settlement().unwrap());
    }

    /// Σ distribution percentage == 1, exactly
    #[test]
    fn test_percentages_partition_one((rate, buyers) in order_strategy()) {
        let mut batch = Batch::new("LOT P", "LC-P", Decimal::from(10_000), rate, 2021);
        build_order(&mut batch, &buyers);
        let order = &batch.delivery_orders[0];
        prop_assume!(order.delivered_retention().unwrap() > Decimal::ZERO);

        let total: Decimal = order
            .distributions
            .iter()
            .map(|d| d.distribution_percentage(order).unwrap())
            .sum();
        prop_assert_eq!(total, Decimal::ONE);
        for distribution in &order.distributions {
            let share = distribution.distribution_percentage(order).unwrap();
            prop_assert!(share >= Decimal::ZERO && share <= Decimal::ONE);
        }
    }

    /// Rollups and summaries are pure
    #[test]
    fn test_rollups_are_idempotent((rate, buyers) in order_strategy()) {
        let mut batch = Batch::new("LOT P", "LC-P", Decimal::from(10_000), rate, 2021);
        build_order(&mut batch, &buyers);
        let order = &batch.delivery_orders[0];

        prop_assert_eq!(order.allocated_amount(), order.allocated_amount());
        prop_assert_eq!(order.final_settlement(), order.final_settlement());
        prop_assert_eq!(order.distribution_percentages(), order.distribution_percentages());

        let first = serde_json::to_value(summarize_order(order, &[]).unwrap()).unwrap();
        let second = serde_json::to_value(summarize_order(order, &[]).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Advance plus retention stays within rounding of the allocated amount
    #[test]
    fn test_advance_and_retention_cover_allocation((rate, buyers) in order_strategy()) {
        let mut batch = Batch::new("LOT P", "LC-P", Decimal::from(10_000), rate, 2021);
        build_order(&mut batch, &buyers);
        let order = &batch.delivery_orders[0];

        let allocated = order.allocated_amount().unwrap();
        let split = order.advance_amount().unwrap() + order.allocated_retention().unwrap();
        let tolerance = Decimal::new(1, 4) * Decimal::from(order.allocations.len() + 1);
        prop_assert!((allocated - split).abs() <= tolerance);
    }

    /// Batch figures are the sum of their orders
    #[test]
    fn test_batch_sums_orders(orders in prop::collection::vec(order_strategy(), 1..4)) {
        let mut batch = Batch::new("LOT P", "LC-P", Decimal::from(10_000), orders[0].0, 2021);
        for (_, buyers) in &orders {
            build_order(&mut batch, buyers);
        }

        let expected_settlement: Decimal = batch
            .delivery_orders
            .iter()
            .map(|o| o.final_settlement().unwrap())
            .sum();
        let expected_quantity: Decimal = batch
            .delivery_orders
            .iter()
            .map(DeliveryOrder::delivered_quantity)
            .sum();

        let summary = summarize_batch(&batch).unwrap();
        prop_assert_eq!(summary.final_settlement, expected_settlement);
        prop_assert_eq!(summary.distributed_quantity, expected_quantity);
        prop_assert_eq!(summary.delivery_orders.len(), orders.len());
    }

    /// Soft-deleted batches never show up in the catalog
    #[test]
    fn test_deleted_batches_never_listed(flags in prop::collection::vec(any::<bool>(), 1..10)) {
        let listed = tokio_test::block_on(async {
            let store = InMemoryStore::new();
            for (n, deleted) in flags.iter().enumerate() {
                let mut batch = Batch::new(&format!("LOT {n}"), &format!("LC-{n}"), Decimal::ONE, Decimal::ONE, 2021);
                batch.is_deleted = *deleted;
                store.seed_batch(batch).await;
            }
            store.list_batches(&BatchFilter::default()).await.unwrap()
        });

        prop_assert_eq!(listed.len(), flags.iter().filter(|d| !**d).count());
        prop_assert!(listed.iter().all(|b| !b.is_deleted));
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_rate_sum_invariant() {
    assert_eq!(ADVANCE_RATE + RETENTION_RATE, Decimal::ONE);
}

#[test]
fn test_negative_settlement_still_reconciles() {
    // large allocation, little delivered: advance exceeds delivery
    let buyers = vec![
        (vec![Decimal::from(500)], vec![(Decimal::from(10), Decimal::ZERO, Decimal::ZERO)]),
        (vec![Decimal::from(300)], vec![(Decimal::from(7), Decimal::ONE, Decimal::ZERO)]),
        (vec![Decimal::from(200)], vec![(Decimal::from(3), Decimal::ZERO, Decimal::ONE)]),
    ];
    let mut batch = Batch::new("LOT N", "LC-N", Decimal::from(1000), Decimal::new(333, 2), 2021);
    build_order(&mut batch, &buyers);
    let order = &batch.delivery_orders[0];

    let settlement = order.final_settlement().unwrap();
    assert!(settlement < Decimal::ZERO);
    assert_eq!(order.total_distributed_amount().unwrap(), settlement);
}
