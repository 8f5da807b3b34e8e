//! Delivery orders and order-level settlement

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Allocation, Customer, Distribution};
use crate::apportion::apportion;
use crate::error::{CalcResult, CalculationError, GraphError};
use crate::types::{
    round_amount, sum_amounts, AuditStamp, RecordStatus, ADVANCE_RATE, AMOUNT_PLACES,
    RETENTION_RATE,
};

/// A shipment against a purchasing batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: Uuid,
    /// Shipment vessel name
    pub vessel: String,
    /// Bill of loading (B/L) number
    pub bill_of_loading: String,
    pub port_id: Option<Uuid>,
    pub arrival_date: NaiveDate,
    /// Terms of the owning batch; `None` when the batch reference is unset
    pub batch: Option<BatchTerms>,
    pub status: RecordStatus,
    pub allocations: Vec<Allocation>,
    pub distributions: Vec<Distribution>,
    pub audit: AuditStamp,
}

/// Agreed quantity and unit rate of the batch an order ships against
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BatchTerms {
    pub batch_id: Uuid,
    pub quantity: Decimal,
    /// USD per product unit
    pub rate: Decimal,
}

/// Allocated and delivered quantities of one buyer, for charts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionalQuantities {
    pub buyer_id: Uuid,
    pub code: String,
    pub allocated: Decimal,
    pub distributed: Decimal,
}

impl DeliveryOrder {
    pub fn new(vessel: &str, bill_of_loading: &str, arrival_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            vessel: vessel.to_string(),
            bill_of_loading: bill_of_loading.to_string(),
            port_id: None,
            arrival_date,
            batch: None,
            status: RecordStatus::Open,
            allocations: Vec::new(),
            distributions: Vec::new(),
            audit: AuditStamp::default(),
        }
    }

    pub fn terms(&self) -> CalcResult<&BatchTerms> {
        self.batch.as_ref().ok_or(CalculationError::MissingReference {
            entity: "delivery order",
            reference: "batch",
        })
    }

    pub fn rate(&self) -> CalcResult<Decimal> {
        self.terms().map(|t| t.rate)
    }

    /// Attach an allocation, rejecting a second one for the same buyer
    pub fn add_allocation(&mut self, mut allocation: Allocation) -> Result<&mut Allocation, GraphError> {
        if self.allocation_for_buyer(allocation.buyer_id).is_some() {
            return Err(GraphError::DuplicateBuyer {
                record: "allocation",
                delivery_order_id: self.id,
                buyer_id: allocation.buyer_id,
            });
        }
        allocation.delivery_order_id = self.id;
        self.allocations.push(allocation);
        let last = self.allocations.len() - 1;
        Ok(&mut self.allocations[last])
    }

    /// Attach a distribution, rejecting a second one for the same buyer
    pub fn add_distribution(
        &mut self,
        mut distribution: Distribution,
    ) -> Result<&mut Distribution, GraphError> {
        if self.distribution_for_buyer(distribution.buyer_id).is_some() {
            return Err(GraphError::DuplicateBuyer {
                record: "distribution",
                delivery_order_id: self.id,
                buyer_id: distribution.buyer_id,
            });
        }
        distribution.delivery_order_id = self.id;
        self.distributions.push(distribution);
        let last = self.distributions.len() - 1;
        Ok(&mut self.distributions[last])
    }

    pub fn allocation_for_buyer(&self, buyer_id: Uuid) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.buyer_id == buyer_id)
    }

    pub fn distribution_for_buyer(&self, buyer_id: Uuid) -> Option<&Distribution> {
        self.distributions.iter().find(|d| d.buyer_id == buyer_id)
    }

    /// Every required buyer has an allocation
    pub fn is_fully_allocated(&self, required_buyers: &[Uuid]) -> bool {
        self.unallocated_buyers(required_buyers).is_empty()
    }

    /// Every required buyer has a distribution
    pub fn is_fully_distributed(&self, required_buyers: &[Uuid]) -> bool {
        self.undistributed_buyers(required_buyers).is_empty()
    }

    /// Required buyers still missing an allocation, in the given order
    pub fn unallocated_buyers(&self, required_buyers: &[Uuid]) -> Vec<Uuid> {
        required_buyers
            .iter()
            .copied()
            .filter(|b| self.allocation_for_buyer(*b).is_none())
            .collect()
    }

    /// Required buyers still missing a distribution, in the given order
    pub fn undistributed_buyers(&self, required_buyers: &[Uuid]) -> Vec<Uuid> {
        required_buyers
            .iter()
            .copied()
            .filter(|b| self.distribution_for_buyer(*b).is_none())
            .collect()
    }

    /// Agreement amount of the owning batch in USD
    pub fn agreement_amount(&self) -> CalcResult<Decimal> {
        let terms = self.terms()?;
        Ok(round_amount(terms.quantity * terms.rate))
    }

    pub fn agreement_retention(&self) -> CalcResult<Decimal> {
        Ok(round_amount(self.agreement_amount()? * RETENTION_RATE))
    }

    /// Advance paid up front against this order's allocation
    pub fn advance_amount(&self) -> CalcResult<Decimal> {
        Ok(round_amount(self.allocated_amount()? * ADVANCE_RATE))
    }

    pub fn allocated_quantity(&self) -> Decimal {
        sum_amounts(self.allocations.iter().map(Allocation::total_quantity))
    }

    /// Delivered quantity including shortage and over-supply
    pub fn delivered_quantity(&self) -> Decimal {
        sum_amounts(self.distributions.iter().map(Distribution::total_quantity))
    }

    pub fn distributed_shortage(&self) -> Decimal {
        sum_amounts(self.distributions.iter().map(Distribution::total_shortage))
    }

    /// Allocated minus delivered quantity; positive means under-delivery
    pub fn total_shortage(&self) -> Decimal {
        round_amount(self.allocated_quantity() - self.delivered_quantity())
    }

    pub fn allocated_amount(&self) -> CalcResult<Decimal> {
        self.sum_over_allocations(|a| a.amount(self))
    }

    pub fn delivered_amount(&self) -> CalcResult<Decimal> {
        self.sum_over_distributions(|d| d.amount(self))
    }

    pub fn allocated_retention(&self) -> CalcResult<Decimal> {
        self.sum_over_allocations(|a| a.retention(self))
    }

    pub fn delivered_retention(&self) -> CalcResult<Decimal> {
        self.sum_over_distributions(|d| d.retention(self))
    }

    /// Retention pool still owed: delivered amount minus the advance paid.
    ///
    /// Negative when the advance exceeded what was delivered.
    pub fn final_settlement(&self) -> CalcResult<Decimal> {
        Ok(round_amount(self.delivered_amount()? - self.advance_amount()?))
    }

    /// Each distribution's fraction of the delivered retention.
    ///
    /// Fractions are apportioned on the 4-place grid so they sum to exactly 1.
    pub fn distribution_percentages(&self) -> CalcResult<Vec<(Uuid, Decimal)>> {
        self.apportion_by_retention(Decimal::ONE)
    }

    /// The final settlement split across distributions by delivered retention.
    ///
    /// Amounts are apportioned on the 4-place grid so they sum to exactly
    /// `final_settlement`.
    pub fn settlement_distribution(&self) -> CalcResult<Vec<(Uuid, Decimal)>> {
        self.apportion_by_retention(self.final_settlement()?)
    }

    /// Sum of the settlement released to every buyer
    pub fn total_distributed_amount(&self) -> CalcResult<Decimal> {
        let mut total = Decimal::ZERO;
        for distribution in &self.distributions {
            total += distribution.distributed_settlement(self)?;
        }
        Ok(round_amount(total))
    }

    /// Allocated and distributed quantity per buyer, ordered by buyer code.
    ///
    /// Buyers without a record show zero.
    pub fn regional_comparison(&self, buyers: &[Customer]) -> Vec<RegionalQuantities> {
        let mut rows: Vec<RegionalQuantities> = buyers
            .iter()
            .map(|buyer| RegionalQuantities {
                buyer_id: buyer.id,
                code: buyer.code.clone(),
                allocated: self
                    .allocation_for_buyer(buyer.id)
                    .map_or(Decimal::ZERO, Allocation::total_quantity),
                distributed: self
                    .distribution_for_buyer(buyer.id)
                    .map_or(Decimal::ZERO, Distribution::total_quantity),
            })
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        rows
    }

    fn apportion_by_retention(&self, total: Decimal) -> CalcResult<Vec<(Uuid, Decimal)>> {
        let retentions = self
            .distributions
            .iter()
            .map(|d| d.retention(self))
            .collect::<CalcResult<Vec<Decimal>>>()?;

        let shares = apportion(total, &retentions, AMOUNT_PLACES).ok_or(
            CalculationError::DivisionByZero {
                context: "delivered retention",
            },
        )?;

        Ok(self
            .distributions
            .iter()
            .map(|d| d.id)
            .zip(shares)
            .collect())
    }

    fn sum_over_allocations<F>(&self, f: F) -> CalcResult<Decimal>
    where
        F: Fn(&Allocation) -> CalcResult<Decimal>,
    {
        let values = self.allocations.iter().map(f).collect::<CalcResult<Vec<_>>>()?;
        Ok(sum_amounts(values))
    }

    fn sum_over_distributions<F>(&self, f: F) -> CalcResult<Decimal>
    where
        F: Fn(&Distribution) -> CalcResult<Decimal>,
    {
        let values = self.distributions.iter().map(f).collect::<CalcResult<Vec<_>>>()?;
        Ok(sum_amounts(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Batch;
    use rust_decimal_macros::dec;

    fn open_order(rate: Decimal) -> (Batch, Uuid) {
        let mut batch = Batch::new("LOT 1", "LC-001", dec!(100), rate, 2020);
        let id = batch
            .add_delivery_order(DeliveryOrder::new(
                "MV Abay",
                "BL-77",
                NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
            ))
            .id;
        (batch, id)
    }

    fn allocate(order: &mut DeliveryOrder, buyer: Uuid, quantities: &[Decimal]) {
        let alloc = quantities.iter().fold(Allocation::new(order.id, buyer), |a, q| {
            a.with_union(Uuid::new_v4(), Uuid::new_v4(), *q)
        });
        order.add_allocation(alloc).unwrap();
    }

    fn distribute(order: &mut DeliveryOrder, buyer: Uuid, rows: &[(Decimal, Decimal, Decimal)]) {
        let dist = rows.iter().fold(Distribution::new(order.id, buyer), |d, (q, s, o)| {
            d.with_union(Uuid::new_v4(), Uuid::new_v4(), *q, *s, *o)
        });
        order.add_distribution(dist).unwrap();
    }

    #[test]
    fn test_allocation_percentages() {
        let (mut batch, _) = open_order(dec!(5));
        let order = &mut batch.delivery_orders[0];
        allocate(order, Uuid::new_v4(), &[dec!(10), dec!(20)]);
        allocate(order, Uuid::new_v4(), &[dec!(30), dec!(40)]);

        assert_eq!(order.allocated_quantity(), dec!(100));
        assert_eq!(order.allocations[0].percentage(order).unwrap(), dec!(30.00));
        assert_eq!(order.allocations[1].percentage(order).unwrap(), dec!(70.00));
    }

    #[test]
    fn test_percentage_with_nothing_allocated_is_division_error() {
        let (mut batch, _) = open_order(dec!(5));
        let order = &mut batch.delivery_orders[0];
        allocate(order, Uuid::new_v4(), &[]);
        assert_eq!(
            order.allocations[0].percentage(order),
            Err(CalculationError::DivisionByZero {
                context: "allocated quantity"
            })
        );
    }

    #[test]
    fn test_fully_allocated_against_required_buyers() {
        let (mut batch, _) = open_order(dec!(5));
        let order = &mut batch.delivery_orders[0];
        let buyers = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

        assert!(!order.is_fully_allocated(&buyers));
        allocate(order, buyers[0], &[dec!(1)]);
        assert!(!order.is_fully_allocated(&buyers));
        assert_eq!(order.unallocated_buyers(&buyers), vec![buyers[1], buyers[2]]);

        allocate(order, buyers[1], &[dec!(1)]);
        allocate(order, buyers[2], &[dec!(1)]);
        assert!(order.is_fully_allocated(&buyers));
        assert!(order.is_fully_allocated(&[]));
    }

    #[test]
    fn test_fully_distributed_against_required_buyers() {
        let (mut batch, _) = open_order(dec!(5));
        let order = &mut batch.delivery_orders[0];
        let buyers = [Uuid::new_v4(), Uuid::new_v4()];

        distribute(order, buyers[1], &[(dec!(1), dec!(0), dec!(0))]);
        assert!(!order.is_fully_distributed(&buyers));
        assert_eq!(order.undistributed_buyers(&buyers), vec![buyers[0]]);
        distribute(order, buyers[0], &[(dec!(1), dec!(0), dec!(0))]);
        assert!(order.is_fully_distributed(&buyers));
    }

    #[test]
    fn test_duplicate_buyer_rejected() {
        let (mut batch, _) = open_order(dec!(5));
        let order = &mut batch.delivery_orders[0];
        let buyer = Uuid::new_v4();
        allocate(order, buyer, &[dec!(1)]);
        let err = order.add_allocation(Allocation::new(order.id, buyer)).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateBuyer { record: "allocation", .. }));
    }

    #[test]
    fn test_order_amounts() {
        let (mut batch, _) = open_order(dec!(5));
        let order = &mut batch.delivery_orders[0];
        allocate(order, Uuid::new_v4(), &[dec!(10), dec!(20)]);
        distribute(
            order,
            Uuid::new_v4(),
            &[(dec!(10), dec!(1), dec!(2)), (dec!(20), dec!(3), dec!(4))],
        );

        assert_eq!(order.agreement_amount().unwrap(), dec!(500));
        assert_eq!(order.agreement_retention().unwrap(), dec!(50));
        assert_eq!(order.allocated_amount().unwrap(), dec!(150));
        assert_eq!(order.advance_amount().unwrap(), dec!(135));
        assert_eq!(order.allocated_retention().unwrap(), dec!(15));
        assert_eq!(order.delivered_quantity(), dec!(40));
        assert_eq!(order.distributed_shortage(), dec!(10));
        assert_eq!(order.delivered_amount().unwrap(), dec!(200));
        assert_eq!(order.delivered_retention().unwrap(), dec!(20));
        assert_eq!(order.total_shortage(), dec!(-10));
        assert_eq!(order.final_settlement().unwrap(), dec!(65));
    }

    #[test]
    fn test_settlement_reconciles_across_three_buyers() {
        let (mut batch, _) = open_order(dec!(7));
        let order = &mut batch.delivery_orders[0];
        let buyers = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        for buyer in buyers {
            allocate(order, buyer, &[dec!(10)]);
            distribute(order, buyer, &[(dec!(10), dec!(0), dec!(0))]);
        }

        let percentages = order.distribution_percentages().unwrap();
        let fraction_sum: Decimal = percentages.iter().map(|(_, p)| *p).sum();
        assert_eq!(fraction_sum, Decimal::ONE);

        let settlement = order.final_settlement().unwrap();
        assert_eq!(settlement, dec!(21));
        assert_eq!(order.total_distributed_amount().unwrap(), settlement);
        assert_eq!(
            order.distributions[0].distributed_settlement(order).unwrap(),
            dec!(7)
        );
    }

    #[test]
    fn test_percentages_without_retention_fail() {
        let (mut batch, _) = open_order(dec!(5));
        let order = &mut batch.delivery_orders[0];
        distribute(order, Uuid::new_v4(), &[(dec!(0), dec!(0), dec!(0))]);
        assert_eq!(
            order.distribution_percentages(),
            Err(CalculationError::DivisionByZero {
                context: "delivered retention"
            })
        );
    }

    #[test]
    fn test_sibling_allocation_lookup() {
        let (mut batch, _) = open_order(dec!(5));
        let order = &mut batch.delivery_orders[0];
        let (with_allocation, without) = (Uuid::new_v4(), Uuid::new_v4());
        allocate(order, with_allocation, &[dec!(12.5)]);
        distribute(order, with_allocation, &[(dec!(12), dec!(0.5), dec!(0))]);
        distribute(order, without, &[(dec!(3), dec!(0), dec!(0))]);

        assert_eq!(order.distributions[0].allocation(order), Some(dec!(12.5)));
        assert_eq!(order.distributions[1].allocation(order), None);
    }

    #[test]
    fn test_regional_comparison_sorted_by_code() {
        let (mut batch, _) = open_order(dec!(5));
        let order = &mut batch.delivery_orders[0];
        let amhara = Customer {
            id: Uuid::new_v4(),
            name: "Amhara Agricultural Input Supply".to_string(),
            region: "Amhara".to_string(),
            code: "AMH".to_string(),
        };
        let oromia = Customer {
            id: Uuid::new_v4(),
            name: "Oromia Cooperatives".to_string(),
            region: "Oromia".to_string(),
            code: "ORO".to_string(),
        };
        allocate(order, oromia.id, &[dec!(40)]);

        let rows = order.regional_comparison(&[oromia.clone(), amhara.clone()]);
        assert_eq!(rows[0].code, "AMH");
        assert_eq!(rows[0].allocated, Decimal::ZERO);
        assert_eq!(rows[1].allocated, dec!(40));
        assert_eq!(rows[1].distributed, Decimal::ZERO);
    }

    #[test]
    fn test_order_without_batch() {
        let order = DeliveryOrder::new(
            "MV Abay",
            "BL-77",
            NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
        );
        assert!(matches!(
            order.agreement_amount(),
            Err(CalculationError::MissingReference { .. })
        ));
        // nothing to price, so no batch is needed
        assert_eq!(order.allocated_amount().unwrap(), Decimal::ZERO);
    }
}
