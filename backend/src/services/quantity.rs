//! Recording allocated and delivered quantities per buyer
//!
//! The only write path for allocations and distributions. Quantities can
//! only change while the delivery order is open.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_allocation, validate_delivery_order, validate_distribution, Action, Allocation,
    AuditStamp, DeliveryOrder, Distribution, Lifecycle, UnionAllocation, UnionDistribution, User,
};
use uuid::Uuid;

use super::{ensure_can, load_order};
use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

/// Quantity allocated to one union at a location
#[derive(Debug, Clone, Deserialize)]
pub struct UnionQuantityInput {
    pub union_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
}

/// Quantity received by one union, with shortage and over-supply
#[derive(Debug, Clone, Deserialize)]
pub struct UnionDeliveryInput {
    pub union_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
    #[serde(default)]
    pub shortage: Decimal,
    #[serde(default)]
    pub over: Decimal,
}

#[derive(Clone)]
pub struct QuantityService {
    store: Arc<dyn ProcurementStore>,
}

impl QuantityService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Create or replace the allocation of `buyer_id` on an open order
    pub async fn record_allocation(
        &self,
        order_id: Uuid,
        buyer_id: Uuid,
        unions: Vec<UnionQuantityInput>,
        actor: &User,
    ) -> AppResult<Allocation> {
        let mut order = self.editable_order(order_id, actor).await?;
        self.ensure_buyer(buyer_id).await?;

        let mut allocation = match order.allocation_for_buyer(buyer_id) {
            Some(existing) => {
                let mut allocation = existing.clone();
                allocation.audit.touch(Some(actor.id));
                allocation
            }
            None => {
                let mut allocation = Allocation::new(order.id, buyer_id);
                allocation.audit = AuditStamp::created_by(Some(actor.id));
                allocation
            }
        };
        allocation.union_allocations = unions
            .into_iter()
            .map(|u| UnionAllocation::new(u.union_id, u.location_id, u.quantity))
            .collect();
        validate_allocation(&allocation)
            .map_err(|msg| AppError::validation("union_allocations", msg))?;

        match order.allocations.iter_mut().find(|a| a.id == allocation.id) {
            Some(stored) => *stored = allocation.clone(),
            None => {
                order.add_allocation(allocation.clone())?;
            }
        }
        validate_delivery_order(&order)
            .map_err(|msg| AppError::validation("delivery_order", msg))?;

        self.store.save_allocation(&allocation).await?;
        self.touch(order, actor).await?;
        tracing::info!(
            delivery_order_id = %order_id,
            buyer_id = %buyer_id,
            user_id = %actor.id,
            quantity = %allocation.total_quantity(),
            "Allocation recorded"
        );
        Ok(allocation)
    }

    /// Create or replace the distribution of `buyer_id` on an open order.
    ///
    /// A buyer may receive a distribution without having an allocation.
    pub async fn record_distribution(
        &self,
        order_id: Uuid,
        buyer_id: Uuid,
        unions: Vec<UnionDeliveryInput>,
        actor: &User,
    ) -> AppResult<Distribution> {
        let mut order = self.editable_order(order_id, actor).await?;
        self.ensure_buyer(buyer_id).await?;

        let mut distribution = match order.distribution_for_buyer(buyer_id) {
            Some(existing) => {
                let mut distribution = existing.clone();
                distribution.audit.touch(Some(actor.id));
                distribution
            }
            None => {
                let mut distribution = Distribution::new(order.id, buyer_id);
                distribution.audit = AuditStamp::created_by(Some(actor.id));
                distribution
            }
        };
        distribution.union_distributions = unions
            .into_iter()
            .map(|u| UnionDistribution::new(u.union_id, u.location_id, u.quantity, u.shortage, u.over))
            .collect();
        validate_distribution(&distribution)
            .map_err(|msg| AppError::validation("union_distributions", msg))?;

        match order.distributions.iter_mut().find(|d| d.id == distribution.id) {
            Some(stored) => *stored = distribution.clone(),
            None => {
                order.add_distribution(distribution.clone())?;
            }
        }
        validate_delivery_order(&order)
            .map_err(|msg| AppError::validation("delivery_order", msg))?;

        self.store.save_distribution(&distribution).await?;
        self.touch(order, actor).await?;
        tracing::info!(
            delivery_order_id = %order_id,
            buyer_id = %buyer_id,
            user_id = %actor.id,
            quantity = %distribution.total_quantity(),
            "Distribution recorded"
        );
        Ok(distribution)
    }

    pub async fn remove_allocation(&self, order_id: Uuid, buyer_id: Uuid, actor: &User) -> AppResult<()> {
        let order = self.editable_order(order_id, actor).await?;
        let id = order
            .allocation_for_buyer(buyer_id)
            .map(|a| a.id)
            .ok_or_else(|| AppError::not_found("allocation for buyer", buyer_id))?;

        self.store.delete_allocation(id).await?;
        self.touch(order, actor).await?;
        tracing::info!(delivery_order_id = %order_id, buyer_id = %buyer_id, "Allocation removed");
        Ok(())
    }

    pub async fn remove_distribution(&self, order_id: Uuid, buyer_id: Uuid, actor: &User) -> AppResult<()> {
        let order = self.editable_order(order_id, actor).await?;
        let id = order
            .distribution_for_buyer(buyer_id)
            .map(|d| d.id)
            .ok_or_else(|| AppError::not_found("distribution for buyer", buyer_id))?;

        self.store.delete_distribution(id).await?;
        self.touch(order, actor).await?;
        tracing::info!(delivery_order_id = %order_id, buyer_id = %buyer_id, "Distribution removed");
        Ok(())
    }

    async fn editable_order(&self, order_id: Uuid, actor: &User) -> AppResult<DeliveryOrder> {
        ensure_can(actor, Action::EditQuantities, "delivery order")?;
        let order = load_order(self.store.as_ref(), order_id, actor).await?;
        order.ensure_editable(actor)?;
        Ok(order)
    }

    async fn ensure_buyer(&self, buyer_id: Uuid) -> AppResult<()> {
        let customers = self.store.customers().await?;
        if customers.iter().any(|c| c.id == buyer_id) {
            Ok(())
        } else {
            Err(AppError::not_found("customer", buyer_id))
        }
    }

    /// Record the change on the order's audit stamp
    async fn touch(&self, mut order: DeliveryOrder, actor: &User) -> AppResult<()> {
        order.touch(actor);
        self.store.update_delivery_order(&order).await
    }
}
