//! Process-local store used by tests and demos

use async_trait::async_trait;
use shared::{
    sort_ports, Allocation, Batch, Customer, DeliveryOrder, Distribution, Port, Product, Supplier,
    User,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BatchFilter, OrderFilter, ProcurementStore};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    /// Batch headers; orders live in `orders`
    batches: Vec<Batch>,
    orders: Vec<DeliveryOrder>,
    customers: Vec<Customer>,
    products: Vec<Product>,
    suppliers: Vec<Supplier>,
    ports: Vec<Port>,
}

impl Tables {
    /// Re-read batch terms the way a join on `batch_id` would
    fn with_current_terms(&self, mut order: DeliveryOrder) -> DeliveryOrder {
        order.batch = order.batch.and_then(|terms| {
            self.batches
                .iter()
                .find(|b| b.id == terms.batch_id)
                .map(Batch::terms)
        });
        order
    }

    fn header(&self, batch_id: Uuid) -> Option<&Batch> {
        self.batches.iter().find(|b| b.id == batch_id)
    }

    fn order_mut(&mut self, id: Uuid) -> AppResult<&mut DeliveryOrder> {
        self.orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| AppError::not_found("delivery order", id))
    }
}

/// Store keeping the relational shape in memory: batch headers and delivery
/// orders are held separately and joined on load.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a batch together with every delivery order it owns
    pub async fn seed_batch(&self, mut batch: Batch) {
        let orders = std::mem::take(&mut batch.delivery_orders);
        let mut tables = self.tables.write().await;
        tables.batches.push(batch);
        tables.orders.extend(orders);
    }

    /// Store a delivery order that may have no batch
    pub async fn seed_order(&self, order: DeliveryOrder) {
        self.tables.write().await.orders.push(order);
    }

    pub async fn seed_user(&self, user: User) {
        self.tables.write().await.users.push(user);
    }

    pub async fn seed_customer(&self, customer: Customer) {
        self.tables.write().await.customers.push(customer);
    }

    pub async fn seed_product(&self, product: Product) {
        self.tables.write().await.products.push(product);
    }

    pub async fn seed_supplier(&self, supplier: Supplier) {
        self.tables.write().await.suppliers.push(supplier);
    }

    pub async fn seed_port(&self, port: Port) {
        let mut tables = self.tables.write().await;
        tables.ports.push(port);
        sort_ports(&mut tables.ports);
    }
}

#[async_trait]
impl ProcurementStore for InMemoryStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn save_user(&self, user: &User) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| AppError::not_found("user", user.id))?;
        stored.role = user.role;
        stored.status = user.status;
        stored.updated_at = user.updated_at;
        Ok(())
    }

    async fn load_batch(&self, id: Uuid) -> AppResult<Option<Batch>> {
        let tables = self.tables.read().await;
        let Some(header) = tables.batches.iter().find(|b| b.id == id) else {
            return Ok(None);
        };

        let mut batch = header.clone();
        let mut orders: Vec<DeliveryOrder> = tables
            .orders
            .iter()
            .filter(|o| o.batch.is_some_and(|terms| terms.batch_id == id))
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.arrival_date, o.audit.created_at));
        for order in orders {
            batch.add_delivery_order(order);
        }
        Ok(Some(batch))
    }

    async fn find_batch(&self, id: Uuid) -> AppResult<Option<Batch>> {
        let tables = self.tables.read().await;
        Ok(tables.header(id).cloned())
    }

    async fn list_batches(&self, filter: &BatchFilter) -> AppResult<Vec<Batch>> {
        let tables = self.tables.read().await;
        let mut batches: Vec<Batch> = tables
            .batches
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        batches.sort_by(|a, b| b.audit.created_at.cmp(&a.audit.created_at));
        Ok(batches)
    }

    async fn insert_batch(&self, batch: &Batch) -> AppResult<()> {
        let mut header = batch.clone();
        header.delivery_orders.clear();
        self.tables.write().await.batches.push(header);
        Ok(())
    }

    async fn update_batch(&self, batch: &Batch) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .batches
            .iter_mut()
            .find(|b| b.id == batch.id)
            .ok_or_else(|| AppError::not_found("batch", batch.id))?;
        stored.quantity = batch.quantity;
        stored.rate = batch.rate;
        stored.status = batch.status;
        stored.is_deleted = batch.is_deleted;
        stored.audit = batch.audit.clone();
        Ok(())
    }

    async fn load_delivery_order(&self, id: Uuid) -> AppResult<Option<DeliveryOrder>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .map(|order| tables.with_current_terms(order)))
    }

    async fn list_delivery_orders(&self, filter: &OrderFilter) -> AppResult<Vec<DeliveryOrder>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<DeliveryOrder> = tables
            .orders
            .iter()
            .filter(|o| {
                let header = o.batch.and_then(|terms| tables.header(terms.batch_id));
                filter.matches(o, header)
            })
            .cloned()
            .map(|order| tables.with_current_terms(order))
            .collect();
        orders.sort_by(|a, b| b.audit.created_at.cmp(&a.audit.created_at));
        Ok(orders)
    }

    async fn insert_delivery_order(&self, order: &DeliveryOrder) -> AppResult<()> {
        let mut header = order.clone();
        header.allocations.clear();
        header.distributions.clear();
        self.tables.write().await.orders.push(header);
        Ok(())
    }

    async fn update_delivery_order(&self, order: &DeliveryOrder) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables.order_mut(order.id)?;
        stored.vessel = order.vessel.clone();
        stored.bill_of_loading = order.bill_of_loading.clone();
        stored.port_id = order.port_id;
        stored.arrival_date = order.arrival_date;
        stored.status = order.status;
        stored.audit = order.audit.clone();
        Ok(())
    }

    async fn delete_delivery_order(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.orders.len();
        tables.orders.retain(|o| o.id != id);
        if tables.orders.len() == before {
            return Err(AppError::not_found("delivery order", id));
        }
        Ok(())
    }

    async fn save_allocation(&self, allocation: &Allocation) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let order = tables.order_mut(allocation.delivery_order_id)?;
        match order.allocations.iter_mut().find(|a| a.id == allocation.id) {
            Some(stored) => *stored = allocation.clone(),
            None => {
                order.add_allocation(allocation.clone())?;
            }
        }
        Ok(())
    }

    async fn delete_allocation(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.allocations.iter().any(|a| a.id == id))
            .ok_or_else(|| AppError::not_found("allocation", id))?;
        order.allocations.retain(|a| a.id != id);
        Ok(())
    }

    async fn save_distribution(&self, distribution: &Distribution) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let order = tables.order_mut(distribution.delivery_order_id)?;
        match order.distributions.iter_mut().find(|d| d.id == distribution.id) {
            Some(stored) => *stored = distribution.clone(),
            None => {
                order.add_distribution(distribution.clone())?;
            }
        }
        Ok(())
    }

    async fn delete_distribution(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.distributions.iter().any(|d| d.id == id))
            .ok_or_else(|| AppError::not_found("distribution", id))?;
        order.distributions.retain(|d| d.id != id);
        Ok(())
    }

    async fn customers(&self) -> AppResult<Vec<Customer>> {
        let mut customers = self.tables.read().await.customers.clone();
        customers.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(customers)
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_supplier(&self, id: Uuid) -> AppResult<Option<Supplier>> {
        let tables = self.tables.read().await;
        Ok(tables.suppliers.iter().find(|s| s.id == id).cloned())
    }

    async fn find_port(&self, id: Uuid) -> AppResult<Option<Port>> {
        let tables = self.tables.read().await;
        Ok(tables.ports.iter().find(|p| p.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_load_batch_joins_current_terms() {
        let store = InMemoryStore::new();
        let mut batch = Batch::new("LOT 1", "LC-1", dec!(100), dec!(50), 2020);
        let order_id = batch
            .add_delivery_order(DeliveryOrder::new(
                "MV Abay",
                "BL-1",
                NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
            ))
            .id;
        let batch_id = batch.id;
        store.seed_batch(batch).await;

        let mut header = store.load_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(header.delivery_orders.len(), 1);

        header.set_terms(dec!(100), dec!(60));
        store.update_batch(&header).await.unwrap();

        let order = store.load_delivery_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.rate().unwrap(), dec!(60));
    }

    #[tokio::test]
    async fn test_delete_missing_order_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.delete_delivery_order(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
