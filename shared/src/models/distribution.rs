//! Actual deliveries to buyers, with transport shortages and over-supply

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DeliveryOrder;
use crate::error::{CalcResult, CalculationError};
use crate::types::{round_amount, sum_amounts, AuditStamp, RETENTION_RATE};

/// Delivered quantity for one buyer within a delivery order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub id: Uuid,
    pub delivery_order_id: Uuid,
    pub buyer_id: Uuid,
    pub union_distributions: Vec<UnionDistribution>,
    pub audit: AuditStamp,
}

/// Quantity received by a single union at a location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnionDistribution {
    pub id: Uuid,
    pub union_id: Uuid,
    pub location_id: Uuid,
    /// Received quantity
    pub quantity: Decimal,
    /// Deficit after transportation
    pub shortage: Decimal,
    /// Over-supplied quantity
    pub over: Decimal,
}

impl UnionDistribution {
    pub fn new(
        union_id: Uuid,
        location_id: Uuid,
        quantity: Decimal,
        shortage: Decimal,
        over: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            union_id,
            location_id,
            quantity,
            shortage,
            over,
        }
    }

    /// Received quantity plus shortage and over-supply
    pub fn total_quantity(&self) -> Decimal {
        round_amount(self.quantity + self.shortage + self.over)
    }

    /// Shortage plus over-supply
    pub fn total_shortage(&self) -> Decimal {
        round_amount(self.shortage + self.over)
    }
}

impl Distribution {
    pub fn new(delivery_order_id: Uuid, buyer_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            delivery_order_id,
            buyer_id,
            union_distributions: Vec::new(),
            audit: AuditStamp::default(),
        }
    }

    /// Append a union-level delivery
    pub fn with_union(
        mut self,
        union_id: Uuid,
        location_id: Uuid,
        quantity: Decimal,
        shortage: Decimal,
        over: Decimal,
    ) -> Self {
        self.union_distributions.push(UnionDistribution::new(
            union_id,
            location_id,
            quantity,
            shortage,
            over,
        ));
        self
    }

    pub fn total_quantity(&self) -> Decimal {
        sum_amounts(self.union_distributions.iter().map(UnionDistribution::total_quantity))
    }

    pub fn total_shortage(&self) -> Decimal {
        sum_amounts(self.union_distributions.iter().map(UnionDistribution::total_shortage))
    }

    pub fn amount(&self, order: &DeliveryOrder) -> CalcResult<Decimal> {
        self.ensure_owned_by(order)?;
        Ok(round_amount(self.total_quantity() * order.rate()?))
    }

    pub fn retention(&self, order: &DeliveryOrder) -> CalcResult<Decimal> {
        self.ensure_owned_by(order)?;
        Ok(round_amount(
            self.total_quantity() * order.rate()? * RETENTION_RATE,
        ))
    }

    /// Quantity allocated to the same buyer on the same order, if any.
    ///
    /// A distribution may be recorded before or without an allocation, so
    /// absence is reported as `None` rather than an error.
    pub fn allocation(&self, order: &DeliveryOrder) -> Option<Decimal> {
        if self.delivery_order_id != order.id {
            return None;
        }
        order
            .allocation_for_buyer(self.buyer_id)
            .map(|a| a.total_quantity())
    }

    /// This buyer's fraction (0-1) of the order's delivered retention
    pub fn distribution_percentage(&self, order: &DeliveryOrder) -> CalcResult<Decimal> {
        self.ensure_owned_by(order)?;
        self.pick(order.distribution_percentages()?)
    }

    /// Amount of the order's final settlement released to this buyer.
    ///
    /// The settlement is apportioned from the buyers' retentions on its own,
    /// so it is generally not `final_settlement * distribution_percentage`
    /// once the percentage has been rounded. Only the sum over all buyers is
    /// guaranteed to equal the final settlement.
    pub fn distributed_settlement(&self, order: &DeliveryOrder) -> CalcResult<Decimal> {
        self.ensure_owned_by(order)?;
        self.pick(order.settlement_distribution()?)
    }

    fn pick(&self, shares: Vec<(Uuid, Decimal)>) -> CalcResult<Decimal> {
        shares
            .into_iter()
            .find(|(id, _)| *id == self.id)
            .map(|(_, share)| share)
            .ok_or(CalculationError::ForeignRecord {
                entity: "distribution",
                id: self.id,
            })
    }

    fn ensure_owned_by(&self, order: &DeliveryOrder) -> CalcResult<()> {
        if self.delivery_order_id != order.id {
            return Err(CalculationError::ForeignRecord {
                entity: "distribution",
                id: self.id,
            });
        }
        Ok(())
    }
}
