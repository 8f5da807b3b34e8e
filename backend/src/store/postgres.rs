//! PostgreSQL adapter
//!
//! Queries load flat row sets; the `assemble_*` functions turn them into the
//! object graph the settlement engine works on.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    Allocation, AuditStamp, Batch, BatchTerms, Customer, DeliveryOrder, Distribution, GraphError,
    Port, Product, ProductCategory, RecordStatus, Role, Supplier, UnionAllocation,
    UnionDistribution, Unit, UnitType, User, UserStatus,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{BatchFilter, OrderFilter, ProcurementStore};
use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BatchRow {
    pub id: Uuid,
    pub name: String,
    pub lc_number: String,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub batch_round: i16,
    pub year: i32,
    pub status: String,
    pub is_deleted: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Delivery order joined with the terms of its batch
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeliveryOrderRow {
    pub id: Uuid,
    pub batch_id: Option<Uuid>,
    pub batch_quantity: Option<Decimal>,
    pub batch_rate: Option<Decimal>,
    pub vessel: String,
    pub bill_of_loading: String,
    pub port_id: Option<Uuid>,
    pub arrival_date: NaiveDate,
    pub status: String,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Header row shared by allocations and distributions
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BuyerRecordRow {
    pub id: Uuid,
    pub delivery_order_id: Uuid,
    pub buyer_id: Uuid,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnionAllocationRow {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub union_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnionDistributionRow {
    pub id: Uuid,
    pub distribution_id: Uuid,
    pub union_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
    pub shortage: Decimal,
    pub over_supply: Decimal,
}

/// Child rows of one or more delivery orders
#[derive(Debug, Clone, Default)]
pub struct OrderChildren {
    pub allocations: Vec<BuyerRecordRow>,
    pub union_allocations: Vec<UnionAllocationRow>,
    pub distributions: Vec<BuyerRecordRow>,
    pub union_distributions: Vec<UnionDistributionRow>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub status: String,
    pub role: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product joined with its category and unit
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category_id: Uuid,
    pub category_name: String,
    pub unit_name: Option<String>,
    pub unit_code: Option<String>,
    pub unit_type: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: Uuid,
    pub name: String,
    pub region: String,
    pub code: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SupplierRow {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PortRow {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub office: String,
    pub is_default: bool,
}

// ============================================================================
// Assembly
// ============================================================================

fn parse_status(entity: &str, id: Uuid, value: &str) -> AppResult<RecordStatus> {
    RecordStatus::from_str(value)
        .ok_or_else(|| AppError::InconsistentData(format!("{entity} {id} has unknown status {value}")))
}

fn audit(
    created_by: Option<Uuid>,
    updated_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> AuditStamp {
    AuditStamp {
        created_by,
        updated_by,
        created_at,
        updated_at,
    }
}

impl BatchRow {
    pub fn into_batch(self) -> AppResult<Batch> {
        let batch_round = u16::try_from(self.batch_round).map_err(|_| {
            AppError::InconsistentData(format!("batch {} has round {}", self.id, self.batch_round))
        })?;

        Ok(Batch {
            status: parse_status("batch", self.id, &self.status)?,
            id: self.id,
            name: self.name,
            lc_number: self.lc_number,
            product_id: self.product_id,
            supplier_id: self.supplier_id,
            quantity: self.quantity,
            rate: self.rate,
            batch_round,
            year: self.year,
            is_deleted: self.is_deleted,
            delivery_orders: Vec::new(),
            audit: audit(self.created_by, self.updated_by, self.created_at, self.updated_at),
        })
    }
}

impl DeliveryOrderRow {
    pub fn into_order(self) -> AppResult<DeliveryOrder> {
        let batch = match (self.batch_id, self.batch_quantity, self.batch_rate) {
            (Some(batch_id), Some(quantity), Some(rate)) => Some(BatchTerms {
                batch_id,
                quantity,
                rate,
            }),
            _ => None,
        };

        Ok(DeliveryOrder {
            status: parse_status("delivery order", self.id, &self.status)?,
            id: self.id,
            vessel: self.vessel,
            bill_of_loading: self.bill_of_loading,
            port_id: self.port_id,
            arrival_date: self.arrival_date,
            batch,
            allocations: Vec::new(),
            distributions: Vec::new(),
            audit: audit(self.created_by, self.updated_by, self.created_at, self.updated_at),
        })
    }
}

impl BuyerRecordRow {
    fn audit(&self) -> AuditStamp {
        audit(self.created_by, self.updated_by, self.created_at, self.updated_at)
    }
}

/// Attach allocation and distribution rows to their delivery orders.
///
/// Union rows are appended in the order given. A row pointing at a parent
/// outside the set is reported as inconsistent data.
pub fn assemble_orders(
    rows: Vec<DeliveryOrderRow>,
    children: OrderChildren,
) -> AppResult<Vec<DeliveryOrder>> {
    let mut orders = rows
        .into_iter()
        .map(DeliveryOrderRow::into_order)
        .collect::<AppResult<Vec<_>>>()?;

    let mut allocations: Vec<Allocation> = children
        .allocations
        .iter()
        .map(|row| Allocation {
            id: row.id,
            delivery_order_id: row.delivery_order_id,
            buyer_id: row.buyer_id,
            union_allocations: Vec::new(),
            audit: row.audit(),
        })
        .collect();
    for row in children.union_allocations {
        let parent = allocations
            .iter_mut()
            .find(|a| a.id == row.allocation_id)
            .ok_or(GraphError::DanglingReference {
                entity: "union allocation",
                id: row.id,
                reference: "allocation",
                reference_id: row.allocation_id,
            })?;
        parent.union_allocations.push(UnionAllocation {
            id: row.id,
            union_id: row.union_id,
            location_id: row.location_id,
            quantity: row.quantity,
        });
    }

    let mut distributions: Vec<Distribution> = children
        .distributions
        .iter()
        .map(|row| Distribution {
            id: row.id,
            delivery_order_id: row.delivery_order_id,
            buyer_id: row.buyer_id,
            union_distributions: Vec::new(),
            audit: row.audit(),
        })
        .collect();
    for row in children.union_distributions {
        let parent = distributions
            .iter_mut()
            .find(|d| d.id == row.distribution_id)
            .ok_or(GraphError::DanglingReference {
                entity: "union distribution",
                id: row.id,
                reference: "distribution",
                reference_id: row.distribution_id,
            })?;
        parent.union_distributions.push(UnionDistribution {
            id: row.id,
            union_id: row.union_id,
            location_id: row.location_id,
            quantity: row.quantity,
            shortage: row.shortage,
            over: row.over_supply,
        });
    }

    for allocation in allocations {
        let order = find_order(&mut orders, "allocation", allocation.id, allocation.delivery_order_id)?;
        order.add_allocation(allocation)?;
    }
    for distribution in distributions {
        let order = find_order(
            &mut orders,
            "distribution",
            distribution.id,
            distribution.delivery_order_id,
        )?;
        order.add_distribution(distribution)?;
    }

    Ok(orders)
}

fn find_order<'a>(
    orders: &'a mut [DeliveryOrder],
    entity: &'static str,
    id: Uuid,
    order_id: Uuid,
) -> Result<&'a mut DeliveryOrder, GraphError> {
    orders
        .iter_mut()
        .find(|o| o.id == order_id)
        .ok_or(GraphError::DanglingReference {
            entity,
            id,
            reference: "delivery order",
            reference_id: order_id,
        })
}

/// Build a batch graph from its header and assembled orders
pub fn assemble_batch(row: BatchRow, orders: Vec<DeliveryOrder>) -> AppResult<Batch> {
    let mut batch = row.into_batch()?;
    for order in orders {
        batch.add_delivery_order(order);
    }
    Ok(batch)
}

impl UserRow {
    pub fn into_user(self) -> AppResult<User> {
        let status = UserStatus::from_str(&self.status).ok_or_else(|| {
            AppError::InconsistentData(format!("user {} has unknown status {}", self.id, self.status))
        })?;
        let role = match self.role.as_deref() {
            None => None,
            Some(value) => Some(Role::from_str(value).ok_or_else(|| {
                AppError::InconsistentData(format!("user {} has unknown role {value}", self.id))
            })?),
        };

        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            status,
            role,
            supplier_id: self.supplier_id,
            is_superuser: self.is_superuser,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl ProductRow {
    pub fn into_product(self) -> AppResult<Product> {
        let unit = match (self.unit_name, self.unit_code, self.unit_type) {
            (Some(name), Some(code), Some(unit_type)) => Some(Unit {
                unit_type: UnitType::from_str(&unit_type).ok_or_else(|| {
                    AppError::InconsistentData(format!("unit {code} has unknown type {unit_type}"))
                })?,
                name,
                code,
            }),
            _ => None,
        };

        Ok(Product {
            id: self.id,
            category: ProductCategory {
                id: self.category_id,
                name: self.category_name,
            },
            name: self.name,
            unit,
            description: self.description,
        })
    }
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            region: row.region,
            code: row.code,
        }
    }
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Supplier {
            id: row.id,
            name: row.name,
            city: row.city,
            country: row.country,
        }
    }
}

impl From<PortRow> for Port {
    fn from(row: PortRow) -> Self {
        Port {
            id: row.id,
            name: row.name,
            country: row.country,
            office: row.office,
            is_default: row.is_default,
        }
    }
}

/// `LIKE` pattern matching values that start with `prefix` literally
pub fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// ============================================================================
// Store
// ============================================================================

const ORDER_COLUMNS: &str = r#"
    SELECT o.id, o.batch_id, b.quantity AS batch_quantity, b.rate AS batch_rate,
           o.vessel, o.bill_of_loading, o.port_id, o.arrival_date, o.status,
           o.created_by, o.updated_by, o.created_at, o.updated_at
    FROM delivery_orders o
    LEFT JOIN batches b ON b.id = o.batch_id
"#;

const BATCH_COLUMNS: &str = r#"
    SELECT id, name, lc_number, product_id, supplier_id, quantity, rate, batch_round,
           year, status, is_deleted, created_by, updated_by, created_at, updated_at
    FROM batches
"#;

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgProcurementStore {
    db: PgPool,
}

impl PgProcurementStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;
        Ok(Self::new(db))
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .map_err(|e| AppError::DatabaseError(e.into()))
    }

    async fn load_children(&self, order_ids: &[Uuid]) -> AppResult<OrderChildren> {
        let allocations = sqlx::query_as::<_, BuyerRecordRow>(
            r#"
            SELECT id, delivery_order_id, buyer_id, created_by, updated_by, created_at, updated_at
            FROM allocations
            WHERE delivery_order_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.db)
        .await?;

        let union_allocations = sqlx::query_as::<_, UnionAllocationRow>(
            r#"
            SELECT ua.id, ua.allocation_id, ua.union_id, ua.location_id, ua.quantity
            FROM union_allocations ua
            JOIN allocations a ON a.id = ua.allocation_id
            WHERE a.delivery_order_id = ANY($1)
            ORDER BY ua.position, ua.id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.db)
        .await?;

        let distributions = sqlx::query_as::<_, BuyerRecordRow>(
            r#"
            SELECT id, delivery_order_id, buyer_id, created_by, updated_by, created_at, updated_at
            FROM distributions
            WHERE delivery_order_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.db)
        .await?;

        let union_distributions = sqlx::query_as::<_, UnionDistributionRow>(
            r#"
            SELECT ud.id, ud.distribution_id, ud.union_id, ud.location_id,
                   ud.quantity, ud.shortage, ud.over_supply
            FROM union_distributions ud
            JOIN distributions d ON d.id = ud.distribution_id
            WHERE d.delivery_order_id = ANY($1)
            ORDER BY ud.position, ud.id
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(OrderChildren {
            allocations,
            union_allocations,
            distributions,
            union_distributions,
        })
    }
}

#[async_trait]
impl ProcurementStore for PgProcurementStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, status, role, supplier_id, is_superuser,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn save_user(&self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET role = $2, status = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(user.id)
        .bind(user.role.map(|r| r.as_str()))
        .bind(user.status.as_str())
        .bind(user.updated_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user", user.id));
        }
        Ok(())
    }

    async fn load_batch(&self, id: Uuid) -> AppResult<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!("{BATCH_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let order_rows = sqlx::query_as::<_, DeliveryOrderRow>(&format!(
            "{ORDER_COLUMNS} WHERE o.batch_id = $1 ORDER BY o.arrival_date, o.created_at"
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let order_ids: Vec<Uuid> = order_rows.iter().map(|o| o.id).collect();
        let children = self.load_children(&order_ids).await?;
        let orders = assemble_orders(order_rows, children)?;

        tracing::debug!(batch_id = %id, orders = orders.len(), "Loaded batch graph");
        assemble_batch(row, orders).map(Some)
    }

    async fn find_batch(&self, id: Uuid) -> AppResult<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!("{BATCH_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.map(BatchRow::into_batch).transpose()
    }

    async fn list_batches(&self, filter: &BatchFilter) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            r#"{BATCH_COLUMNS}
            WHERE is_deleted = FALSE
              AND ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::uuid IS NULL OR supplier_id = $3)
              AND ($4::text IS NULL OR LOWER(name) LIKE $4 OR LOWER(lc_number) LIKE $4)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.product_id)
        .bind(filter.supplier_id)
        .bind(filter.search_prefix().as_deref().map(like_prefix))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(BatchRow::into_batch).collect()
    }

    async fn insert_batch(&self, batch: &Batch) -> AppResult<()> {
        let batch_round = i16::try_from(batch.batch_round)
            .map_err(|_| AppError::validation("batch_round", "Batch round is out of range"))?;

        sqlx::query(
            r#"
            INSERT INTO batches (id, name, lc_number, product_id, supplier_id, quantity, rate,
                                 batch_round, year, status, is_deleted, created_by, updated_by,
                                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(batch.id)
        .bind(&batch.name)
        .bind(&batch.lc_number)
        .bind(batch.product_id)
        .bind(batch.supplier_id)
        .bind(batch.quantity)
        .bind(batch.rate)
        .bind(batch_round)
        .bind(batch.year)
        .bind(batch.status.as_str())
        .bind(batch.is_deleted)
        .bind(batch.audit.created_by)
        .bind(batch.audit.updated_by)
        .bind(batch.audit.created_at)
        .bind(batch.audit.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn update_batch(&self, batch: &Batch) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE batches
            SET quantity = $2, rate = $3, status = $4, is_deleted = $5,
                updated_by = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(batch.id)
        .bind(batch.quantity)
        .bind(batch.rate)
        .bind(batch.status.as_str())
        .bind(batch.is_deleted)
        .bind(batch.audit.updated_by)
        .bind(batch.audit.updated_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("batch", batch.id));
        }
        Ok(())
    }

    async fn load_delivery_order(&self, id: Uuid) -> AppResult<Option<DeliveryOrder>> {
        let row = sqlx::query_as::<_, DeliveryOrderRow>(&format!("{ORDER_COLUMNS} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let children = self.load_children(&[id]).await?;
        let mut orders = assemble_orders(vec![row], children)?;
        tracing::debug!(delivery_order_id = %id, "Loaded delivery order graph");
        Ok(orders.pop())
    }

    async fn list_delivery_orders(&self, filter: &OrderFilter) -> AppResult<Vec<DeliveryOrder>> {
        let lc_number = filter
            .lc_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let rows = sqlx::query_as::<_, DeliveryOrderRow>(&format!(
            r#"{ORDER_COLUMNS}
            WHERE (b.id IS NULL OR b.is_deleted = FALSE)
              AND ($1::varchar IS NULL OR o.status = $1)
              AND ($2::uuid IS NULL OR o.batch_id = $2)
              AND ($3::varchar IS NULL OR b.lc_number = $3)
              AND ($4::uuid IS NULL OR b.product_id = $4)
              AND ($5::uuid IS NULL OR b.supplier_id = $5)
              AND ($6::text IS NULL OR LOWER(o.vessel) LIKE $6 OR LOWER(b.lc_number) LIKE $6)
            ORDER BY o.created_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.batch_id)
        .bind(lc_number)
        .bind(filter.product_id)
        .bind(filter.supplier_id)
        .bind(filter.search_prefix().as_deref().map(like_prefix))
        .fetch_all(&self.db)
        .await?;

        let order_ids: Vec<Uuid> = rows.iter().map(|o| o.id).collect();
        let children = self.load_children(&order_ids).await?;
        assemble_orders(rows, children)
    }

    async fn insert_delivery_order(&self, order: &DeliveryOrder) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO delivery_orders (id, batch_id, vessel, bill_of_loading, port_id,
                                         arrival_date, status, created_by, updated_by,
                                         created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id)
        .bind(order.batch.map(|terms| terms.batch_id))
        .bind(&order.vessel)
        .bind(&order.bill_of_loading)
        .bind(order.port_id)
        .bind(order.arrival_date)
        .bind(order.status.as_str())
        .bind(order.audit.created_by)
        .bind(order.audit.updated_by)
        .bind(order.audit.created_at)
        .bind(order.audit.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn update_delivery_order(&self, order: &DeliveryOrder) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE delivery_orders
            SET vessel = $2, bill_of_loading = $3, port_id = $4, arrival_date = $5,
                status = $6, updated_by = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(&order.vessel)
        .bind(&order.bill_of_loading)
        .bind(order.port_id)
        .bind(order.arrival_date)
        .bind(order.status.as_str())
        .bind(order.audit.updated_by)
        .bind(order.audit.updated_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("delivery order", order.id));
        }
        Ok(())
    }

    async fn delete_delivery_order(&self, id: Uuid) -> AppResult<()> {
        // allocations and distributions cascade
        let result = sqlx::query("DELETE FROM delivery_orders WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("delivery order", id));
        }
        Ok(())
    }

    async fn save_allocation(&self, allocation: &Allocation) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO allocations (id, delivery_order_id, buyer_id, created_by, updated_by,
                                     created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET updated_by = EXCLUDED.updated_by, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(allocation.id)
        .bind(allocation.delivery_order_id)
        .bind(allocation.buyer_id)
        .bind(allocation.audit.created_by)
        .bind(allocation.audit.updated_by)
        .bind(allocation.audit.created_at)
        .bind(allocation.audit.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM union_allocations WHERE allocation_id = $1")
            .bind(allocation.id)
            .execute(&mut *tx)
            .await?;

        for (position, union) in allocation.union_allocations.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO union_allocations (id, allocation_id, union_id, location_id,
                                               quantity, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(union.id)
            .bind(allocation.id)
            .bind(union.union_id)
            .bind(union.location_id)
            .bind(union.quantity)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_allocation(&self, id: Uuid) -> AppResult<()> {
        // union rows cascade
        let result = sqlx::query("DELETE FROM allocations WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("allocation", id));
        }
        Ok(())
    }

    async fn save_distribution(&self, distribution: &Distribution) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO distributions (id, delivery_order_id, buyer_id, created_by, updated_by,
                                       created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET updated_by = EXCLUDED.updated_by, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(distribution.id)
        .bind(distribution.delivery_order_id)
        .bind(distribution.buyer_id)
        .bind(distribution.audit.created_by)
        .bind(distribution.audit.updated_by)
        .bind(distribution.audit.created_at)
        .bind(distribution.audit.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM union_distributions WHERE distribution_id = $1")
            .bind(distribution.id)
            .execute(&mut *tx)
            .await?;

        for (position, union) in distribution.union_distributions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO union_distributions (id, distribution_id, union_id, location_id,
                                                 quantity, shortage, over_supply, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(union.id)
            .bind(distribution.id)
            .bind(union.union_id)
            .bind(union.location_id)
            .bind(union.quantity)
            .bind(union.shortage)
            .bind(union.over)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_distribution(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM distributions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("distribution", id));
        }
        Ok(())
    }

    async fn customers(&self) -> AppResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, region, code FROM customers ORDER BY code",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.name, p.description, c.id AS category_id, c.name AS category_name,
                   u.name AS unit_name, u.code AS unit_code, u.unit_type
            FROM products p
            JOIN product_categories c ON c.id = p.category_id
            LEFT JOIN units u ON u.id = p.unit_id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(ProductRow::into_product).transpose()
    }

    async fn find_supplier(&self, id: Uuid) -> AppResult<Option<Supplier>> {
        let row = sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, city, country FROM suppliers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Supplier::from))
    }

    async fn find_port(&self, id: Uuid) -> AppResult<Option<Port>> {
        let row = sqlx::query_as::<_, PortRow>(
            "SELECT id, name, country, office, is_default FROM ports WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Port::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order_row(id: Uuid, batch: Option<(Uuid, Decimal, Decimal)>) -> DeliveryOrderRow {
        DeliveryOrderRow {
            id,
            batch_id: batch.map(|b| b.0),
            batch_quantity: batch.map(|b| b.1),
            batch_rate: batch.map(|b| b.2),
            vessel: "MV Abay".to_string(),
            bill_of_loading: "BL-1".to_string(),
            port_id: None,
            arrival_date: NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
            status: "OPEN".to_string(),
            created_by: None,
            updated_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn record_row(id: Uuid, order_id: Uuid, buyer_id: Uuid) -> BuyerRecordRow {
        BuyerRecordRow {
            id,
            delivery_order_id: order_id,
            buyer_id,
            created_by: None,
            updated_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_assemble_orders_attaches_children() {
        let order_id = Uuid::new_v4();
        let batch_id = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let allocation_id = Uuid::new_v4();
        let distribution_id = Uuid::new_v4();

        let children = OrderChildren {
            allocations: vec![record_row(allocation_id, order_id, buyer)],
            union_allocations: vec![UnionAllocationRow {
                id: Uuid::new_v4(),
                allocation_id,
                union_id: Uuid::new_v4(),
                location_id: Uuid::new_v4(),
                quantity: dec!(30),
            }],
            distributions: vec![record_row(distribution_id, order_id, buyer)],
            union_distributions: vec![UnionDistributionRow {
                id: Uuid::new_v4(),
                distribution_id,
                union_id: Uuid::new_v4(),
                location_id: Uuid::new_v4(),
                quantity: dec!(28),
                shortage: dec!(2),
                over_supply: dec!(0),
            }],
        };

        let orders = assemble_orders(
            vec![order_row(order_id, Some((batch_id, dec!(100), dec!(5))))],
            children,
        )
        .unwrap();

        let order = &orders[0];
        assert_eq!(order.allocated_quantity(), dec!(30));
        assert_eq!(order.delivered_quantity(), dec!(30));
        assert_eq!(order.distributed_shortage(), dec!(2));
        assert_eq!(order.rate().unwrap(), dec!(5));
    }

    #[test]
    fn test_order_without_batch_has_no_terms() {
        let orders = assemble_orders(vec![order_row(Uuid::new_v4(), None)], OrderChildren::default())
            .unwrap();
        assert!(orders[0].batch.is_none());
    }

    #[test]
    fn test_dangling_union_row_is_inconsistent() {
        let order_id = Uuid::new_v4();
        let children = OrderChildren {
            union_allocations: vec![UnionAllocationRow {
                id: Uuid::new_v4(),
                allocation_id: Uuid::new_v4(),
                union_id: Uuid::new_v4(),
                location_id: Uuid::new_v4(),
                quantity: dec!(1),
            }],
            ..Default::default()
        };

        let err = assemble_orders(vec![order_row(order_id, None)], children).unwrap_err();
        assert_eq!(err.code(), "INCONSISTENT_DATA");
    }

    #[test]
    fn test_duplicate_buyer_rows_are_rejected() {
        let order_id = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let children = OrderChildren {
            allocations: vec![
                record_row(Uuid::new_v4(), order_id, buyer),
                record_row(Uuid::new_v4(), order_id, buyer),
            ],
            ..Default::default()
        };
        assert!(assemble_orders(vec![order_row(order_id, None)], children).is_err());
    }

    #[test]
    fn test_unknown_status_is_inconsistent() {
        let mut row = order_row(Uuid::new_v4(), None);
        row.status = "ARCHIVED".to_string();
        assert!(matches!(row.into_order(), Err(AppError::InconsistentData(_))));
    }

    #[test]
    fn test_user_row_parses_role() {
        let row = UserRow {
            id: Uuid::new_v4(),
            username: "almaz".to_string(),
            email: None,
            status: "ACTIVE".to_string(),
            role: Some("staff".to_string()),
            supplier_id: None,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let user = row.into_user().unwrap();
        assert_eq!(user.role, Some(Role::Staff));
        assert_eq!(user.status, UserStatus::Active);
    }

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("lot"), "lot%");
        assert_eq!(like_prefix("10%_a"), "10\\%\\_a%");
    }
}
