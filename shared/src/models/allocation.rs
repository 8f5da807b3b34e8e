//! Planned quantity allocations to buyers

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DeliveryOrder;
use crate::error::{CalcResult, CalculationError};
use crate::types::{round_amount, round_percent, sum_amounts, AuditStamp, RETENTION_RATE};

/// Planned quantity for one buyer within a delivery order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub delivery_order_id: Uuid,
    pub buyer_id: Uuid,
    /// One entry per union and location, in entry order
    pub union_allocations: Vec<UnionAllocation>,
    pub audit: AuditStamp,
}

/// Quantity allocated to a single union at a location, in product units
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnionAllocation {
    pub id: Uuid,
    pub union_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
}

impl UnionAllocation {
    pub fn new(union_id: Uuid, location_id: Uuid, quantity: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            union_id,
            location_id,
            quantity,
        }
    }
}

impl Allocation {
    pub fn new(delivery_order_id: Uuid, buyer_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            delivery_order_id,
            buyer_id,
            union_allocations: Vec::new(),
            audit: AuditStamp::default(),
        }
    }

    /// Append a union-level quantity
    pub fn with_union(mut self, union_id: Uuid, location_id: Uuid, quantity: Decimal) -> Self {
        self.union_allocations
            .push(UnionAllocation::new(union_id, location_id, quantity));
        self
    }

    /// Total allocated quantity over all unions
    pub fn total_quantity(&self) -> Decimal {
        sum_amounts(self.union_allocations.iter().map(|u| u.quantity))
    }

    /// Allocated quantity priced at the batch rate
    pub fn amount(&self, order: &DeliveryOrder) -> CalcResult<Decimal> {
        self.ensure_owned_by(order)?;
        Ok(round_amount(self.total_quantity() * order.rate()?))
    }

    /// Retention share of the allocated amount
    pub fn retention(&self, order: &DeliveryOrder) -> CalcResult<Decimal> {
        self.ensure_owned_by(order)?;
        Ok(round_amount(
            self.total_quantity() * order.rate()? * RETENTION_RATE,
        ))
    }

    /// Share of the order's allocated quantity, as a 0-100 percentage.
    ///
    /// Fails with `DivisionByZero` while the order has nothing allocated;
    /// callers showing percentages should check `allocated_quantity` first.
    pub fn percentage(&self, order: &DeliveryOrder) -> CalcResult<Decimal> {
        self.ensure_owned_by(order)?;
        let allocated = order.allocated_quantity();
        if allocated.is_zero() {
            return Err(CalculationError::DivisionByZero {
                context: "allocated quantity",
            });
        }
        Ok(round_percent(
            self.total_quantity() / allocated * Decimal::ONE_HUNDRED,
        ))
    }

    fn ensure_owned_by(&self, order: &DeliveryOrder) -> CalcResult<()> {
        if self.delivery_order_id != order.id {
            return Err(CalculationError::ForeignRecord {
                entity: "allocation",
                id: self.id,
            });
        }
        Ok(())
    }
}
