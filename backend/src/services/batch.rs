//! Batch catalog: listing and creation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    parse_formatted_decimal, validate_batch_name, validate_batch_terms, validate_batch_year,
    validate_lc_number, Action, AuditStamp, Batch, PaginatedResponse, Pagination, RecordStatus,
    Role, User,
};
use uuid::Uuid;

use super::ensure_can;
use crate::error::{AppError, AppResult};
use crate::store::{BatchFilter, ProcurementStore};

#[derive(Clone)]
pub struct BatchService {
    store: Arc<dyn ProcurementStore>,
}

/// Input for creating a batch.
///
/// Quantity and rate are accepted as entered, thousands separators included.
#[derive(Debug, Deserialize)]
pub struct CreateBatchInput {
    pub name: String,
    pub lc_number: String,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub quantity: String,
    pub rate: String,
    pub batch_round: Option<u16>,
    pub year: i32,
}

/// Batch line in the catalog
#[derive(Debug, Clone, Serialize)]
pub struct BatchListItem {
    pub id: Uuid,
    pub name: String,
    pub lc_number: String,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub year: i32,
    pub batch_round: u16,
    pub status: RecordStatus,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub agreement_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&Batch> for BatchListItem {
    fn from(batch: &Batch) -> Self {
        Self {
            id: batch.id,
            name: batch.name.clone(),
            lc_number: batch.lc_number.clone(),
            product_id: batch.product_id,
            supplier_id: batch.supplier_id,
            year: batch.year,
            batch_round: batch.batch_round,
            status: batch.status,
            quantity: batch.quantity,
            rate: batch.rate,
            agreement_amount: batch.agreement_amount(),
            created_at: batch.audit.created_at,
        }
    }
}

impl BatchService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Live batches matching `filter`, newest first.
    ///
    /// Supplier accounts only ever see their own supplier's batches.
    pub async fn list(
        &self,
        filter: BatchFilter,
        pagination: &Pagination,
        actor: &User,
    ) -> AppResult<PaginatedResponse<BatchListItem>> {
        ensure_can(actor, Action::View, "batch")?;

        let mut filter = filter;
        if actor.role == Some(Role::Supplier) && !actor.is_superuser {
            match actor.supplier_id {
                Some(supplier_id) => filter.supplier_id = Some(supplier_id),
                None => return Ok(PaginatedResponse::from_items(Vec::new(), pagination)),
            }
        }

        let items: Vec<BatchListItem> = self
            .store
            .list_batches(&filter)
            .await?
            .iter()
            .filter(|b| actor.can_view_supplier(b.supplier_id))
            .map(BatchListItem::from)
            .collect();

        tracing::debug!(user_id = %actor.id, count = items.len(), "Batches listed");
        Ok(PaginatedResponse::from_items(items, pagination))
    }

    pub async fn create(&self, input: CreateBatchInput, actor: &User) -> AppResult<Batch> {
        ensure_can(actor, Action::Create, "batch")?;

        validate_batch_name(&input.name).map_err(|msg| AppError::validation("name", msg))?;
        validate_lc_number(&input.lc_number).map_err(|msg| AppError::validation("lc_number", msg))?;
        validate_batch_year(input.year).map_err(|msg| AppError::validation("year", msg))?;
        let quantity = parse_formatted_decimal(&input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;
        let rate =
            parse_formatted_decimal(&input.rate).map_err(|msg| AppError::validation("rate", msg))?;
        validate_batch_terms(quantity, rate).map_err(|msg| {
            let field = if quantity < Decimal::ZERO { "quantity" } else { "rate" };
            AppError::validation(field, msg)
        })?;

        let mut batch = Batch::new(input.name.trim(), input.lc_number.trim(), quantity, rate, input.year);
        batch.product_id = input.product_id;
        batch.supplier_id = input.supplier_id;
        batch.batch_round = input.batch_round.unwrap_or(1);
        batch.audit = AuditStamp::created_by(Some(actor.id));

        self.store.insert_batch(&batch).await?;
        tracing::info!(batch_id = %batch.id, user_id = %actor.id, "Batch created");
        Ok(batch)
    }
}
