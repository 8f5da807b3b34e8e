//! Persistence port for the procurement object graph
//!
//! Services depend on [`ProcurementStore`] only. `PgProcurementStore` backs
//! it with PostgreSQL; `InMemoryStore` keeps everything in process memory.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::*;

use async_trait::async_trait;
use serde::Deserialize;
use shared::{
    Allocation, Batch, Customer, DeliveryOrder, Distribution, Port, Product, RecordStatus,
    Supplier, User,
};
use uuid::Uuid;

use crate::error::AppResult;

/// Filters for the batch catalog
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchFilter {
    pub status: Option<RecordStatus>,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    /// Case-insensitive prefix of the batch name or LC number
    pub search: Option<String>,
}

impl BatchFilter {
    /// Whether a batch header passes the filter. Soft-deleted batches never do.
    pub fn matches(&self, batch: &Batch) -> bool {
        if batch.is_deleted {
            return false;
        }
        if self.status.is_some_and(|status| status != batch.status) {
            return false;
        }
        if self.product_id.is_some() && self.product_id != batch.product_id {
            return false;
        }
        if self.supplier_id.is_some() && self.supplier_id != batch.supplier_id {
            return false;
        }
        match self.search_prefix() {
            Some(prefix) => {
                batch.name.to_lowercase().starts_with(&prefix)
                    || batch.lc_number.to_lowercase().starts_with(&prefix)
            }
            None => true,
        }
    }

    /// Lower-cased search term, `None` when blank
    pub fn search_prefix(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Filters for the delivery order catalog
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<RecordStatus>,
    pub batch_id: Option<Uuid>,
    /// Exact LC number of the batch
    pub lc_number: Option<String>,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    /// Case-insensitive prefix of the vessel name or LC number
    pub search: Option<String>,
}

impl OrderFilter {
    /// Whether an order passes the filter, given the header of its batch.
    ///
    /// Orders of a soft-deleted batch never do. Orders without a batch only
    /// pass filters that don't look at batch fields.
    pub fn matches(&self, order: &DeliveryOrder, batch: Option<&Batch>) -> bool {
        if batch.is_some_and(|b| b.is_deleted) {
            return false;
        }
        if self.status.is_some_and(|status| status != order.status) {
            return false;
        }
        if self.batch_id.is_some() && self.batch_id != batch.map(|b| b.id) {
            return false;
        }
        if self.product_id.is_some() && self.product_id != batch.and_then(|b| b.product_id) {
            return false;
        }
        if self.supplier_id.is_some() && self.supplier_id != batch.and_then(|b| b.supplier_id) {
            return false;
        }
        if let Some(lc_number) = self.lc_number.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if batch.map(|b| b.lc_number.as_str()) != Some(lc_number) {
                return false;
            }
        }
        match self.search_prefix() {
            Some(prefix) => {
                order.vessel.to_lowercase().starts_with(&prefix)
                    || batch.is_some_and(|b| b.lc_number.to_lowercase().starts_with(&prefix))
            }
            None => true,
        }
    }

    pub fn search_prefix(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

#[async_trait]
pub trait ProcurementStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Persist role, status and `updated_at` of an existing user
    async fn save_user(&self, user: &User) -> AppResult<()>;

    /// Batch with its delivery orders and their allocations and distributions
    async fn load_batch(&self, id: Uuid) -> AppResult<Option<Batch>>;

    /// Batch header without its orders, deleted or not
    async fn find_batch(&self, id: Uuid) -> AppResult<Option<Batch>>;

    /// Batch headers passing `filter`, newest first; `delivery_orders` is empty
    async fn list_batches(&self, filter: &BatchFilter) -> AppResult<Vec<Batch>>;

    async fn insert_batch(&self, batch: &Batch) -> AppResult<()>;

    /// Persist the header fields of a batch: terms, status, deletion flag, audit
    async fn update_batch(&self, batch: &Batch) -> AppResult<()>;

    /// Delivery order with its children and the terms of its batch
    async fn load_delivery_order(&self, id: Uuid) -> AppResult<Option<DeliveryOrder>>;

    /// Orders with their children passing `filter`, newest first
    async fn list_delivery_orders(&self, filter: &OrderFilter) -> AppResult<Vec<DeliveryOrder>>;

    /// Insert the header of a new delivery order; children are saved separately
    async fn insert_delivery_order(&self, order: &DeliveryOrder) -> AppResult<()>;

    /// Persist the header fields, status and audit stamp of a delivery order
    async fn update_delivery_order(&self, order: &DeliveryOrder) -> AppResult<()>;

    /// Remove a delivery order together with its allocations and distributions
    async fn delete_delivery_order(&self, id: Uuid) -> AppResult<()>;

    /// Insert or replace an allocation together with its union rows
    async fn save_allocation(&self, allocation: &Allocation) -> AppResult<()>;

    async fn delete_allocation(&self, id: Uuid) -> AppResult<()>;

    /// Insert or replace a distribution together with its union rows
    async fn save_distribution(&self, distribution: &Distribution) -> AppResult<()>;

    async fn delete_distribution(&self, id: Uuid) -> AppResult<()>;

    /// All buyers, ordered by code
    async fn customers(&self) -> AppResult<Vec<Customer>>;

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;

    async fn find_supplier(&self, id: Uuid) -> AppResult<Option<Supplier>>;

    async fn find_port(&self, id: Uuid) -> AppResult<Option<Port>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn batch(name: &str, lc: &str) -> Batch {
        Batch::new(name, lc, Decimal::ONE, Decimal::ONE, 2020)
    }

    #[test]
    fn test_search_matches_name_or_lc_prefix() {
        let filter = BatchFilter {
            search: Some(" lot ".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&batch("LOT 4", "LC-9")));
        assert!(!filter.matches(&batch("Urea", "LC-9")));

        let filter = BatchFilter {
            search: Some("lc-9".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&batch("Urea", "LC-9")));
    }

    #[test]
    fn test_deleted_batches_never_match() {
        let mut deleted = batch("LOT 1", "LC-1");
        deleted.is_deleted = true;
        assert!(!BatchFilter::default().matches(&deleted));
    }

    #[test]
    fn test_order_filter_skips_deleted_batches() {
        let mut header = batch("LOT 5", "LC-5");
        let mut order = shared::DeliveryOrder::new(
            "MV Abay",
            "BL-5",
            chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        );
        order.batch = Some(header.terms());

        assert!(OrderFilter::default().matches(&order, Some(&header)));
        header.is_deleted = true;
        assert!(!OrderFilter::default().matches(&order, Some(&header)));
    }

    #[test]
    fn test_order_filter_by_lc_and_search() {
        let header = batch("LOT 6", "LC-6");
        let order = shared::DeliveryOrder::new(
            "MV Tana",
            "BL-6",
            chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        );

        let by_lc = OrderFilter {
            lc_number: Some("LC-6".to_string()),
            ..Default::default()
        };
        assert!(by_lc.matches(&order, Some(&header)));
        assert!(!by_lc.matches(&order, None));

        let search = OrderFilter {
            search: Some("mv t".to_string()),
            ..Default::default()
        };
        assert!(search.matches(&order, None));
        let search = OrderFilter {
            search: Some("lc-6".to_string()),
            ..Default::default()
        };
        assert!(search.matches(&order, Some(&header)));
        assert!(!search.matches(&order, None));
    }

    #[test]
    fn test_status_and_supplier_filters() {
        let supplier = Uuid::new_v4();
        let mut closed = batch("LOT 2", "LC-2");
        closed.status = RecordStatus::Closed;
        closed.supplier_id = Some(supplier);

        let filter = BatchFilter {
            status: Some(RecordStatus::Open),
            ..Default::default()
        };
        assert!(!filter.matches(&closed));

        let filter = BatchFilter {
            supplier_id: Some(supplier),
            ..Default::default()
        };
        assert!(filter.matches(&closed));
    }
}
