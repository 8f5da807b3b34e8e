//! Facts for the bank allocation letter of a delivery order

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{Action, CalculationError, User};
use uuid::Uuid;

use super::{ensure_can, load_batch, load_order};
use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

/// Everything a letter renderer needs, already formatted where it matters
#[derive(Debug, Serialize)]
pub struct AllocationLetterFacts {
    pub subject: String,
    pub vessel: String,
    /// Allocated quantity of the order, 2 places
    pub allocated_quantity: Decimal,
    pub unit_code: Option<String>,
    pub product_name: String,
    /// Lower-cased category name
    pub category_name: String,
    pub bill_of_loading: String,
    pub batch_name: String,
    pub port_name: String,
    pub port_office: String,
    pub arrival_date: NaiveDate,
    pub supplier_name: String,
    pub lines: Vec<LetterLine>,
}

/// One debit line per allocation
#[derive(Debug, Serialize)]
pub struct LetterLine {
    pub buyer_name: String,
    pub buyer_code: String,
    pub region: String,
    /// 2 places
    pub quantity: Decimal,
}

#[derive(Clone)]
pub struct LetterService {
    store: Arc<dyn ProcurementStore>,
}

fn missing(entity: &'static str, reference: &'static str) -> AppError {
    CalculationError::MissingReference { entity, reference }.into()
}

impl LetterService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    pub async fn allocation_letter(&self, order_id: Uuid, actor: &User) -> AppResult<AllocationLetterFacts> {
        ensure_can(actor, Action::View, "delivery order")?;
        let order = load_order(self.store.as_ref(), order_id, actor).await?;
        let terms = order.terms()?;
        let batch = load_batch(self.store.as_ref(), terms.batch_id).await?;

        let product_id = batch.product_id.ok_or_else(|| missing("batch", "product"))?;
        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or_else(|| AppError::not_found("product", product_id))?;

        let supplier_id = batch.supplier_id.ok_or_else(|| missing("batch", "supplier"))?;
        let supplier = self
            .store
            .find_supplier(supplier_id)
            .await?
            .ok_or_else(|| AppError::not_found("supplier", supplier_id))?;

        let port_id = order.port_id.ok_or_else(|| missing("delivery order", "port"))?;
        let port = self
            .store
            .find_port(port_id)
            .await?
            .ok_or_else(|| AppError::not_found("port", port_id))?;

        let customers = self.store.customers().await?;
        let lines = order
            .allocations
            .iter()
            .map(|allocation| {
                let buyer = customers
                    .iter()
                    .find(|c| c.id == allocation.buyer_id)
                    .ok_or_else(|| AppError::not_found("customer", allocation.buyer_id))?;
                Ok(LetterLine {
                    buyer_name: buyer.name.clone(),
                    buyer_code: buyer.code.clone(),
                    region: buyer.region.clone(),
                    quantity: allocation.total_quantity().round_dp(2),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        tracing::info!(delivery_order_id = %order_id, user_id = %actor.id, "Allocation letter prepared");

        Ok(AllocationLetterFacts {
            subject: format!("Documentary Credit Number {}", batch.lc_number),
            vessel: order.vessel.clone(),
            allocated_quantity: order.allocated_quantity().round_dp(2),
            unit_code: product.unit.map(|u| u.code),
            product_name: product.name,
            category_name: product.category.name.to_lowercase(),
            bill_of_loading: order.bill_of_loading.clone(),
            batch_name: batch.name,
            port_name: port.name,
            port_office: port.office,
            arrival_date: order.arrival_date,
            supplier_name: supplier.name,
            lines,
        })
    }
}
