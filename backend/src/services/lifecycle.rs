//! Status transitions for batches and delivery orders

use std::sync::Arc;

use shared::{Batch, DeliveryOrder, Lifecycle, TransitionError, User};
use uuid::Uuid;

use super::{ensure_visible, load_batch_header, load_order};
use crate::error::AppResult;
use crate::store::ProcurementStore;

/// Lifecycle service applying close, reopen and delete
#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn ProcurementStore>,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    pub async fn close_delivery_order(&self, id: Uuid, actor: &User) -> AppResult<DeliveryOrder> {
        self.transition_order(id, actor, "closed", |order, actor| order.close(actor))
            .await
    }

    /// Reopen a closed delivery order (administrators only)
    pub async fn reopen_delivery_order(&self, id: Uuid, actor: &User) -> AppResult<DeliveryOrder> {
        self.transition_order(id, actor, "reopened", |order, actor| order.reopen(actor))
            .await
    }

    /// Delete a closed delivery order with its allocations and distributions
    pub async fn delete_delivery_order(&self, id: Uuid, actor: &User) -> AppResult<()> {
        let order = load_order(self.store.as_ref(), id, actor).await?;
        order.ensure_deletable(actor)?;

        self.store.delete_delivery_order(id).await?;
        tracing::info!(delivery_order_id = %id, user_id = %actor.id, "Delivery order deleted");
        Ok(())
    }

    pub async fn close_batch(&self, id: Uuid, actor: &User) -> AppResult<Batch> {
        self.transition_batch(id, actor, "closed", |batch, actor| batch.close(actor))
            .await
    }

    pub async fn reopen_batch(&self, id: Uuid, actor: &User) -> AppResult<Batch> {
        self.transition_batch(id, actor, "reopened", |batch, actor| batch.reopen(actor))
            .await
    }

    /// Soft-delete a closed batch; it disappears from listings
    pub async fn delete_batch(&self, id: Uuid, actor: &User) -> AppResult<Batch> {
        self.transition_batch(id, actor, "deleted", |batch, actor| batch.soft_delete(actor))
            .await
    }

    async fn transition_order<F>(
        &self,
        id: Uuid,
        actor: &User,
        outcome: &str,
        apply: F,
    ) -> AppResult<DeliveryOrder>
    where
        F: FnOnce(&mut DeliveryOrder, &User) -> Result<(), TransitionError>,
    {
        let mut order = load_order(self.store.as_ref(), id, actor).await?;
        apply(&mut order, actor)?;

        self.store.update_delivery_order(&order).await?;
        tracing::info!(
            delivery_order_id = %id,
            user_id = %actor.id,
            status = order.status.as_str(),
            "Delivery order {outcome}"
        );
        Ok(order)
    }

    async fn transition_batch<F>(&self, id: Uuid, actor: &User, outcome: &str, apply: F) -> AppResult<Batch>
    where
        F: FnOnce(&mut Batch, &User) -> Result<(), TransitionError>,
    {
        let mut batch = load_batch_header(self.store.as_ref(), id).await?;
        ensure_visible(actor, batch.supplier_id)?;
        apply(&mut batch, actor)?;

        self.store.update_batch(&batch).await?;
        tracing::info!(
            batch_id = %id,
            user_id = %actor.id,
            status = batch.status.as_str(),
            "Batch {outcome}"
        );
        Ok(batch)
    }
}
