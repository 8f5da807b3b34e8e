//! Business logic services for the Fertilizer Procurement Platform
//!
//! Services load object graphs through [`ProcurementStore`], check the
//! acting user's permissions and run the settlement engine.

pub mod batch;
pub mod delivery_order;
pub mod letter;
pub mod lifecycle;
pub mod quantity;
pub mod role;
pub mod settlement;

pub use batch::BatchService;
pub use delivery_order::DeliveryOrderService;
pub use letter::LetterService;
pub use lifecycle::LifecycleService;
pub use quantity::QuantityService;
pub use role::RoleService;
pub use settlement::SettlementService;

use shared::{authorize, Action, Batch, DeliveryOrder, User, UserStatus};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

/// Check that `actor` may perform `action` on an `entity`
pub(crate) fn ensure_can(actor: &User, action: Action, entity: &'static str) -> AppResult<()> {
    if !actor.is_superuser && actor.status != UserStatus::Active {
        tracing::warn!(user_id = %actor.id, status = actor.status.as_str(), "Inactive account denied");
        return Err(AppError::InsufficientPermissions(actor.denial_reason().to_string()));
    }
    authorize(entity, actor, action).map_err(|err| {
        tracing::warn!(user_id = %actor.id, %action, entity, "Permission denied");
        AppError::from(err)
    })
}

/// Check that `actor` may see records of the batch's supplier
pub(crate) fn ensure_visible(actor: &User, supplier_id: Option<Uuid>) -> AppResult<()> {
    if actor.can_view_supplier(supplier_id) {
        Ok(())
    } else {
        tracing::warn!(user_id = %actor.id, "Supplier scope denied");
        Err(AppError::InsufficientPermissions(actor.denial_reason().to_string()))
    }
}

/// Live (not soft-deleted) batch graph
pub(crate) async fn load_batch(store: &dyn ProcurementStore, id: Uuid) -> AppResult<Batch> {
    store
        .load_batch(id)
        .await?
        .filter(|b| !b.is_deleted)
        .ok_or_else(|| AppError::not_found("batch", id))
}

/// Live batch header, without its orders
pub(crate) async fn load_batch_header(store: &dyn ProcurementStore, id: Uuid) -> AppResult<Batch> {
    store
        .find_batch(id)
        .await?
        .filter(|b| !b.is_deleted)
        .ok_or_else(|| AppError::not_found("batch", id))
}

/// Delivery order graph the actor may see.
///
/// Orders of a soft-deleted batch are reported as not found.
pub(crate) async fn load_order(
    store: &dyn ProcurementStore,
    id: Uuid,
    actor: &User,
) -> AppResult<DeliveryOrder> {
    let order = store
        .load_delivery_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("delivery order", id))?;

    let supplier_id = match order.batch {
        Some(terms) => match store.find_batch(terms.batch_id).await? {
            Some(header) if header.is_deleted => {
                return Err(AppError::not_found("delivery order", id));
            }
            Some(header) => header.supplier_id,
            None => None,
        },
        None => None,
    };
    ensure_visible(actor, supplier_id)?;
    Ok(order)
}
