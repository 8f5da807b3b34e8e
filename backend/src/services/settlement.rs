//! Settlement summaries for batches and delivery orders

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    Action, Batch, CalcResult, CalculationError, Customer, DeliveryOrder, RecordStatus,
    RegionalQuantities, User,
};
use uuid::Uuid;

use super::{ensure_can, ensure_visible, load_batch, load_order};
use crate::error::AppResult;
use crate::store::ProcurementStore;

/// Settlement service producing the batch and order summaries
#[derive(Clone)]
pub struct SettlementService {
    store: Arc<dyn ProcurementStore>,
}

/// Batch-level figures with one overview line per delivery order
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub name: String,
    pub lc_number: String,
    pub status: RecordStatus,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub agreement_amount: Decimal,
    pub agreement_advance: Decimal,
    pub agreement_retention: Decimal,
    pub allocated_quantity: Decimal,
    pub unallocated_quantity: Decimal,
    pub allocated_amount: Decimal,
    pub advance_amount: Decimal,
    pub retention_amount: Decimal,
    pub distributed_quantity: Decimal,
    pub distributed_shortage: Decimal,
    pub distributed_amount: Decimal,
    pub final_settlement: Decimal,
    pub delivery_orders: Vec<OrderOverview>,
}

#[derive(Debug, Serialize)]
pub struct OrderOverview {
    pub delivery_order_id: Uuid,
    pub vessel: String,
    pub bill_of_loading: String,
    pub arrival_date: NaiveDate,
    pub status: RecordStatus,
    pub allocated_quantity: Decimal,
    pub delivered_quantity: Decimal,
    pub final_settlement: Decimal,
}

/// Order-level figures with per-buyer allocation and distribution lines
#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub delivery_order_id: Uuid,
    pub vessel: String,
    pub bill_of_loading: String,
    pub arrival_date: NaiveDate,
    pub status: RecordStatus,
    pub agreement_amount: Decimal,
    pub agreement_retention: Decimal,
    pub advance_amount: Decimal,
    pub allocated_quantity: Decimal,
    pub delivered_quantity: Decimal,
    pub distributed_shortage: Decimal,
    pub total_shortage: Decimal,
    pub allocated_amount: Decimal,
    pub delivered_amount: Decimal,
    pub allocated_retention: Decimal,
    pub delivered_retention: Decimal,
    pub final_settlement: Decimal,
    /// `None` while nothing with a retention has been delivered
    pub total_distributed_amount: Option<Decimal>,
    pub allocations: Vec<AllocationLine>,
    pub distributions: Vec<DistributionLine>,
}

#[derive(Debug, Serialize)]
pub struct AllocationLine {
    pub allocation_id: Uuid,
    pub buyer_id: Uuid,
    pub buyer_code: Option<String>,
    pub quantity: Decimal,
    pub amount: Decimal,
    pub retention: Decimal,
    /// Share of the order's allocated quantity, 0-100
    pub percentage: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct DistributionLine {
    pub distribution_id: Uuid,
    pub buyer_id: Uuid,
    pub buyer_code: Option<String>,
    pub quantity: Decimal,
    pub shortage: Decimal,
    /// Quantity allocated to the same buyer, if an allocation exists
    pub allocated: Option<Decimal>,
    pub amount: Decimal,
    pub retention: Decimal,
    /// Share of the delivered retention, 0-1
    pub distribution_percentage: Option<Decimal>,
    pub distributed_settlement: Option<Decimal>,
}

/// Which buyers still lack an allocation or distribution
#[derive(Debug, Serialize)]
pub struct OrderReadiness {
    pub delivery_order_id: Uuid,
    pub fully_allocated: bool,
    pub fully_distributed: bool,
    pub unallocated_buyers: Vec<Customer>,
    pub undistributed_buyers: Vec<Customer>,
}

/// Map a zero denominator to "no value" and keep every other failure
fn unless_zero_total<T>(result: CalcResult<T>) -> CalcResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(CalculationError::DivisionByZero { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

fn buyer_code(customers: &[Customer], buyer_id: Uuid) -> Option<String> {
    customers
        .iter()
        .find(|c| c.id == buyer_id)
        .map(|c| c.code.clone())
}

fn pick(customers: &[Customer], ids: &[Uuid]) -> Vec<Customer> {
    customers
        .iter()
        .filter(|c| ids.contains(&c.id))
        .cloned()
        .collect()
}

impl SettlementService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    pub async fn batch_summary(&self, batch_id: Uuid, actor: &User) -> AppResult<BatchSummary> {
        ensure_can(actor, Action::View, "batch")?;
        let batch = load_batch(self.store.as_ref(), batch_id).await?;
        ensure_visible(actor, batch.supplier_id)?;

        let summary = summarize_batch(&batch)?;
        tracing::debug!(batch_id = %batch_id, orders = summary.delivery_orders.len(), "Batch summary built");
        Ok(summary)
    }

    pub async fn order_summary(&self, order_id: Uuid, actor: &User) -> AppResult<OrderSummary> {
        let order = self.visible_order(order_id, actor).await?;
        let customers = self.store.customers().await?;

        let summary = summarize_order(&order, &customers)?;
        tracing::debug!(delivery_order_id = %order_id, "Order summary built");
        Ok(summary)
    }

    /// Completeness of an order against every registered buyer
    pub async fn readiness(&self, order_id: Uuid, actor: &User) -> AppResult<OrderReadiness> {
        let order = self.visible_order(order_id, actor).await?;
        let customers = self.store.customers().await?;
        let required: Vec<Uuid> = customers.iter().map(|c| c.id).collect();

        Ok(OrderReadiness {
            delivery_order_id: order.id,
            fully_allocated: order.is_fully_allocated(&required),
            fully_distributed: order.is_fully_distributed(&required),
            unallocated_buyers: pick(&customers, &order.unallocated_buyers(&required)),
            undistributed_buyers: pick(&customers, &order.undistributed_buyers(&required)),
        })
    }

    /// Allocated against distributed quantity per buyer, ordered by buyer code
    pub async fn regional_chart(&self, order_id: Uuid, actor: &User) -> AppResult<Vec<RegionalQuantities>> {
        let order = self.visible_order(order_id, actor).await?;
        let customers = self.store.customers().await?;
        Ok(order.regional_comparison(&customers))
    }

    async fn visible_order(&self, order_id: Uuid, actor: &User) -> AppResult<DeliveryOrder> {
        ensure_can(actor, Action::View, "delivery order")?;
        load_order(self.store.as_ref(), order_id, actor).await
    }
}

pub fn summarize_batch(batch: &Batch) -> CalcResult<BatchSummary> {
    let delivery_orders = batch
        .delivery_orders
        .iter()
        .map(|order| {
            Ok(OrderOverview {
                delivery_order_id: order.id,
                vessel: order.vessel.clone(),
                bill_of_loading: order.bill_of_loading.clone(),
                arrival_date: order.arrival_date,
                status: order.status,
                allocated_quantity: order.allocated_quantity(),
                delivered_quantity: order.delivered_quantity(),
                final_settlement: order.final_settlement()?,
            })
        })
        .collect::<CalcResult<Vec<_>>>()?;

    Ok(BatchSummary {
        batch_id: batch.id,
        name: batch.name.clone(),
        lc_number: batch.lc_number.clone(),
        status: batch.status,
        quantity: batch.quantity,
        rate: batch.rate,
        agreement_amount: batch.agreement_amount(),
        agreement_advance: batch.agreement_advance(),
        agreement_retention: batch.agreement_retention(),
        allocated_quantity: batch.allocated_quantity(),
        unallocated_quantity: batch.unallocated_quantity(),
        allocated_amount: batch.allocated_amount()?,
        advance_amount: batch.advance_amount()?,
        retention_amount: batch.retention_amount()?,
        distributed_quantity: batch.distributed_quantity(),
        distributed_shortage: batch.distributed_shortage(),
        distributed_amount: batch.distributed_amount()?,
        final_settlement: batch.final_settlement()?,
        delivery_orders,
    })
}

pub fn summarize_order(order: &DeliveryOrder, customers: &[Customer]) -> CalcResult<OrderSummary> {
    let allocations = order
        .allocations
        .iter()
        .map(|allocation| {
            Ok(AllocationLine {
                allocation_id: allocation.id,
                buyer_id: allocation.buyer_id,
                buyer_code: buyer_code(customers, allocation.buyer_id),
                quantity: allocation.total_quantity(),
                amount: allocation.amount(order)?,
                retention: allocation.retention(order)?,
                percentage: unless_zero_total(allocation.percentage(order))?,
            })
        })
        .collect::<CalcResult<Vec<_>>>()?;

    let percentages = unless_zero_total(order.distribution_percentages())?;
    let settlements = unless_zero_total(order.settlement_distribution())?;
    let share = |shares: &Option<Vec<(Uuid, Decimal)>>, id: Uuid| {
        shares
            .as_ref()
            .and_then(|s| s.iter().find(|(d, _)| *d == id).map(|(_, v)| *v))
    };

    let distributions = order
        .distributions
        .iter()
        .map(|distribution| {
            Ok(DistributionLine {
                distribution_id: distribution.id,
                buyer_id: distribution.buyer_id,
                buyer_code: buyer_code(customers, distribution.buyer_id),
                quantity: distribution.total_quantity(),
                shortage: distribution.total_shortage(),
                allocated: distribution.allocation(order),
                amount: distribution.amount(order)?,
                retention: distribution.retention(order)?,
                distribution_percentage: share(&percentages, distribution.id),
                distributed_settlement: share(&settlements, distribution.id),
            })
        })
        .collect::<CalcResult<Vec<_>>>()?;

    Ok(OrderSummary {
        delivery_order_id: order.id,
        vessel: order.vessel.clone(),
        bill_of_loading: order.bill_of_loading.clone(),
        arrival_date: order.arrival_date,
        status: order.status,
        agreement_amount: order.agreement_amount()?,
        agreement_retention: order.agreement_retention()?,
        advance_amount: order.advance_amount()?,
        allocated_quantity: order.allocated_quantity(),
        delivered_quantity: order.delivered_quantity(),
        distributed_shortage: order.distributed_shortage(),
        total_shortage: order.total_shortage(),
        allocated_amount: order.allocated_amount()?,
        delivered_amount: order.delivered_amount()?,
        allocated_retention: order.allocated_retention()?,
        delivered_retention: order.delivered_retention()?,
        final_settlement: order.final_settlement()?,
        total_distributed_amount: unless_zero_total(order.total_distributed_amount())?,
        allocations,
        distributions,
    })
}
