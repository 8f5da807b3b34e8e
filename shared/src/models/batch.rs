//! Purchasing batches (LOTs) and batch-level rollups

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BatchTerms, DeliveryOrder};
use crate::error::CalcResult;
use crate::types::{round_amount, sum_amounts, AuditStamp, RecordStatus, ADVANCE_RATE, RETENTION_RATE};

/// A purchasing agreement with a supplier for a quantity at a fixed rate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub name: String,
    /// Letter of credit number
    pub lc_number: String,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    /// Agreed quantity in product units
    pub quantity: Decimal,
    /// USD per product unit
    pub rate: Decimal,
    /// Purchasing round within the year
    pub batch_round: u16,
    pub year: i32,
    pub status: RecordStatus,
    pub is_deleted: bool,
    pub delivery_orders: Vec<DeliveryOrder>,
    pub audit: AuditStamp,
}

impl Batch {
    pub fn new(name: &str, lc_number: &str, quantity: Decimal, rate: Decimal, year: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            lc_number: lc_number.to_string(),
            product_id: None,
            supplier_id: None,
            quantity,
            rate,
            batch_round: 1,
            year,
            status: RecordStatus::Open,
            is_deleted: false,
            delivery_orders: Vec::new(),
            audit: AuditStamp::default(),
        }
    }

    pub fn terms(&self) -> BatchTerms {
        BatchTerms {
            batch_id: self.id,
            quantity: self.quantity,
            rate: self.rate,
        }
    }

    /// Take ownership of a delivery order and point it at this batch
    pub fn add_delivery_order(&mut self, mut order: DeliveryOrder) -> &mut DeliveryOrder {
        order.batch = Some(self.terms());
        self.delivery_orders.push(order);
        let last = self.delivery_orders.len() - 1;
        &mut self.delivery_orders[last]
    }

    /// Change the agreed quantity and rate, updating every owned order
    pub fn set_terms(&mut self, quantity: Decimal, rate: Decimal) {
        self.quantity = quantity;
        self.rate = rate;
        let terms = self.terms();
        for order in &mut self.delivery_orders {
            order.batch = Some(terms);
        }
    }

    pub fn agreement_amount(&self) -> Decimal {
        round_amount(self.quantity * self.rate)
    }

    pub fn agreement_advance(&self) -> Decimal {
        round_amount(self.agreement_amount() * ADVANCE_RATE)
    }

    pub fn agreement_retention(&self) -> Decimal {
        round_amount(self.agreement_amount() * RETENTION_RATE)
    }

    pub fn allocated_quantity(&self) -> Decimal {
        sum_amounts(self.delivery_orders.iter().map(DeliveryOrder::allocated_quantity))
    }

    /// Agreed quantity not yet allocated to any buyer
    pub fn unallocated_quantity(&self) -> Decimal {
        round_amount(self.quantity - self.allocated_quantity())
    }

    pub fn allocated_amount(&self) -> CalcResult<Decimal> {
        self.accumulate(DeliveryOrder::allocated_amount)
    }

    pub fn advance_amount(&self) -> CalcResult<Decimal> {
        self.accumulate(DeliveryOrder::advance_amount)
    }

    pub fn retention_amount(&self) -> CalcResult<Decimal> {
        self.accumulate(DeliveryOrder::allocated_retention)
    }

    pub fn distributed_quantity(&self) -> Decimal {
        sum_amounts(self.delivery_orders.iter().map(DeliveryOrder::delivered_quantity))
    }

    pub fn distributed_shortage(&self) -> Decimal {
        sum_amounts(self.delivery_orders.iter().map(DeliveryOrder::distributed_shortage))
    }

    pub fn distributed_amount(&self) -> CalcResult<Decimal> {
        self.accumulate(DeliveryOrder::delivered_amount)
    }

    pub fn final_settlement(&self) -> CalcResult<Decimal> {
        self.accumulate(DeliveryOrder::final_settlement)
    }

    fn accumulate<F>(&self, f: F) -> CalcResult<Decimal>
    where
        F: Fn(&DeliveryOrder) -> CalcResult<Decimal>,
    {
        let mut total = Decimal::ZERO;
        for order in &self.delivery_orders {
            total += f(order)?;
        }
        Ok(round_amount(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Allocation, Distribution};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    /// Two orders, each with two allocations and two identical distributions
    fn sample_batch() -> Batch {
        let mut batch = Batch::new("Test batch", "LC-2020-01", dec!(100), dec!(50), 2020);
        let allocations = [
            [[dec!(10), dec!(20)], [dec!(30), dec!(40)]],
            [[dec!(50), dec!(60)], [dec!(70), dec!(80)]],
        ];

        for (n, pair) in allocations.iter().enumerate() {
            let order = batch.add_delivery_order(DeliveryOrder::new(
                &format!("Vessel {n}"),
                &format!("BL-{n}"),
                NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            ));
            for quantities in pair {
                let buyer = Uuid::new_v4();
                let alloc = quantities.iter().fold(Allocation::new(order.id, buyer), |a, q| {
                    a.with_union(Uuid::new_v4(), Uuid::new_v4(), *q)
                });
                order.add_allocation(alloc).unwrap();

                let dist = Distribution::new(order.id, buyer)
                    .with_union(Uuid::new_v4(), Uuid::new_v4(), dec!(10), dec!(1), dec!(2))
                    .with_union(Uuid::new_v4(), Uuid::new_v4(), dec!(20), dec!(1), dec!(2));
                order.add_distribution(dist).unwrap();
            }
        }
        batch
    }

    #[test]
    fn test_agreement_amount() {
        let batch = Batch::new("Test batch", "LC-1", dec!(100), dec!(50), 2020);
        assert_eq!(batch.agreement_amount(), dec!(5000.0000));
        assert_eq!(batch.agreement_advance(), dec!(4500));
        assert_eq!(batch.agreement_retention(), dec!(500));
    }

    #[test]
    fn test_batch_rollups() {
        let batch = sample_batch();
        assert_eq!(batch.allocated_quantity(), dec!(360.0000));
        assert_eq!(batch.allocated_amount().unwrap(), dec!(18000.0000));
        assert_eq!(batch.advance_amount().unwrap(), dec!(16200.0000));
        assert_eq!(batch.retention_amount().unwrap(), dec!(1800.0000));
        assert_eq!(batch.distributed_quantity(), dec!(144.0000));
        assert_eq!(batch.distributed_shortage(), dec!(24.0000));
        assert_eq!(batch.distributed_amount().unwrap(), dec!(7200.0000));
        assert_eq!(batch.unallocated_quantity(), dec!(-260));
    }

    #[test]
    fn test_final_settlement_sums_orders() {
        let batch = sample_batch();
        // delivered 7200 minus advance 16200
        assert_eq!(batch.final_settlement().unwrap(), dec!(-9000));
    }

    #[test]
    fn test_set_terms_propagates_to_orders() {
        let mut batch = sample_batch();
        batch.set_terms(dec!(400), dec!(10));
        assert!(batch
            .delivery_orders
            .iter()
            .all(|o| o.rate().unwrap() == dec!(10)));
        assert_eq!(batch.allocated_amount().unwrap(), dec!(3600));
    }

    #[test]
    fn test_empty_batch_rollups_are_zero() {
        let batch = Batch::new("Empty", "LC-2", dec!(10), dec!(1), 2020);
        assert_eq!(batch.allocated_quantity(), Decimal::ZERO);
        assert_eq!(batch.distributed_amount().unwrap(), Decimal::ZERO);
    }
}
