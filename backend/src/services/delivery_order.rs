//! Delivery order catalog and shipment details

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_bill_of_loading, validate_port_country, validate_vessel, Action, AuditStamp, Batch,
    DeliveryOrder, Lifecycle, PaginatedResponse, Pagination, RecordStatus, Role, User,
};
use uuid::Uuid;

use super::{ensure_can, ensure_visible, load_batch_header, load_order};
use crate::error::{AppError, AppResult};
use crate::store::{OrderFilter, ProcurementStore};

#[derive(Clone)]
pub struct DeliveryOrderService {
    store: Arc<dyn ProcurementStore>,
}

/// Shipment details entered for a delivery order
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryOrderInput {
    pub vessel: String,
    pub bill_of_loading: String,
    pub port_id: Option<Uuid>,
    pub arrival_date: NaiveDate,
}

/// Delivery order line in the catalog
#[derive(Debug, Clone, Serialize)]
pub struct OrderListItem {
    pub id: Uuid,
    pub vessel: String,
    pub bill_of_loading: String,
    pub arrival_date: NaiveDate,
    pub status: RecordStatus,
    pub batch_id: Option<Uuid>,
    pub batch_name: Option<String>,
    pub lc_number: Option<String>,
    pub allocated_quantity: Decimal,
    pub delivered_quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderListItem {
    fn new(order: &DeliveryOrder, batch: Option<&Batch>) -> Self {
        Self {
            id: order.id,
            vessel: order.vessel.clone(),
            bill_of_loading: order.bill_of_loading.clone(),
            arrival_date: order.arrival_date,
            status: order.status,
            batch_id: order.batch.map(|terms| terms.batch_id),
            batch_name: batch.map(|b| b.name.clone()),
            lc_number: batch.map(|b| b.lc_number.clone()),
            allocated_quantity: order.allocated_quantity(),
            delivered_quantity: order.delivered_quantity(),
            created_at: order.audit.created_at,
        }
    }
}

impl DeliveryOrderService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Orders matching `filter`, newest first.
    ///
    /// Orders of deleted batches are never listed and supplier accounts only
    /// see orders of their own supplier's batches.
    pub async fn list(
        &self,
        filter: OrderFilter,
        pagination: &Pagination,
        actor: &User,
    ) -> AppResult<PaginatedResponse<OrderListItem>> {
        ensure_can(actor, Action::View, "delivery order")?;

        let mut filter = filter;
        if actor.role == Some(Role::Supplier) && !actor.is_superuser {
            match actor.supplier_id {
                Some(supplier_id) => filter.supplier_id = Some(supplier_id),
                None => return Ok(PaginatedResponse::from_items(Vec::new(), pagination)),
            }
        }

        let orders = self.store.list_delivery_orders(&filter).await?;
        let mut headers: HashMap<Uuid, Option<Batch>> = HashMap::new();
        let mut items = Vec::with_capacity(orders.len());
        for order in &orders {
            let header = match order.batch {
                Some(terms) => {
                    if !headers.contains_key(&terms.batch_id) {
                        let found = self.store.find_batch(terms.batch_id).await?;
                        headers.insert(terms.batch_id, found);
                    }
                    headers.get(&terms.batch_id).and_then(Option::as_ref)
                }
                None => None,
            };
            if header.is_some_and(|b| b.is_deleted) {
                continue;
            }
            if actor.can_view_supplier(header.and_then(|b| b.supplier_id)) {
                items.push(OrderListItem::new(order, header));
            }
        }

        tracing::debug!(user_id = %actor.id, count = items.len(), "Delivery orders listed");
        Ok(PaginatedResponse::from_items(items, pagination))
    }

    /// Register a new shipment against a live batch
    pub async fn create(
        &self,
        batch_id: Uuid,
        input: DeliveryOrderInput,
        actor: &User,
    ) -> AppResult<DeliveryOrder> {
        ensure_can(actor, Action::Create, "delivery order")?;
        let batch = load_batch_header(self.store.as_ref(), batch_id).await?;
        ensure_visible(actor, batch.supplier_id)?;
        self.check_details(&input).await?;

        let mut order = DeliveryOrder::new(
            input.vessel.trim(),
            input.bill_of_loading.trim(),
            input.arrival_date,
        );
        order.port_id = input.port_id;
        order.batch = Some(batch.terms());
        order.audit = AuditStamp::created_by(Some(actor.id));

        self.store.insert_delivery_order(&order).await?;
        tracing::info!(
            delivery_order_id = %order.id,
            batch_id = %batch_id,
            user_id = %actor.id,
            "Delivery order created"
        );
        Ok(order)
    }

    /// Change the shipment details of an open delivery order
    pub async fn update(
        &self,
        id: Uuid,
        input: DeliveryOrderInput,
        actor: &User,
    ) -> AppResult<DeliveryOrder> {
        ensure_can(actor, Action::Update, "delivery order")?;
        let mut order = load_order(self.store.as_ref(), id, actor).await?;
        order.require_status(Action::Update, RecordStatus::Open)?;
        self.check_details(&input).await?;

        order.vessel = input.vessel.trim().to_string();
        order.bill_of_loading = input.bill_of_loading.trim().to_string();
        order.port_id = input.port_id;
        order.arrival_date = input.arrival_date;
        order.touch(actor);

        self.store.update_delivery_order(&order).await?;
        tracing::info!(delivery_order_id = %id, user_id = %actor.id, "Delivery order updated");
        Ok(order)
    }

    async fn check_details(&self, input: &DeliveryOrderInput) -> AppResult<()> {
        validate_vessel(&input.vessel).map_err(|msg| AppError::validation("vessel", msg))?;
        validate_bill_of_loading(&input.bill_of_loading)
            .map_err(|msg| AppError::validation("bill_of_loading", msg))?;

        if let Some(port_id) = input.port_id {
            let port = self
                .store
                .find_port(port_id)
                .await?
                .ok_or_else(|| AppError::not_found("port", port_id))?;
            validate_port_country(&port.country)
                .map_err(|msg| AppError::validation("port_id", msg))?;
        }
        Ok(())
    }
}
