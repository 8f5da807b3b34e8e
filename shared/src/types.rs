//! Common types used across the platform

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Share of the agreement paid up front
pub const ADVANCE_RATE: Decimal = dec!(0.9);

/// Share held back until distribution is confirmed
pub const RETENTION_RATE: Decimal = dec!(0.1);

/// Decimal places kept for quantities and amounts
pub const AMOUNT_PLACES: u32 = 4;

/// Decimal places kept for 0-100 percentages
pub const PERCENT_PLACES: u32 = 2;

/// Round a quantity or monetary amount to the standard 4 places.
///
/// Uses banker's rounding (midpoint to even).
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp(AMOUNT_PLACES)
}

/// Round a 0-100 percentage to 2 places
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp(PERCENT_PLACES)
}

/// Sum values with a zero-initialized decimal accumulator and round once at the end
pub fn sum_amounts<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round_amount(values.into_iter().fold(Decimal::ZERO, |total, v| total + v))
}

/// Status shared by batches and delivery orders
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    #[default]
    Open,
    Closed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Open => "OPEN",
            RecordStatus::Closed => "CLOSED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(RecordStatus::Open),
            "CLOSED" => Some(RecordStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Open => write!(f, "open"),
            RecordStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Who created and last touched a record, and when
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditStamp {
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuditStamp {
    /// Stamp for a record created now by `user`
    pub fn created_by(user: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            created_by: user,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move `updated_at` to now, recording the actor when one is given
    pub fn touch(&mut self, updated_by: Option<Uuid>) {
        if updated_by.is_some() {
            self.updated_by = updated_by;
        }
        self.updated_at = Utc::now();
    }
}

impl Default for AuditStamp {
    fn default() -> Self {
        Self::created_by(None)
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl Pagination {
    /// Zero-based offset of the first item on this page
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.per_page.max(1) as usize
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    /// Cut one page out of an already filtered and ordered list
    pub fn from_items(items: Vec<T>, pagination: &Pagination) -> Self {
        let total_items = items.len() as u64;
        let per_page = pagination.per_page.max(1);
        let total_pages = ((total_items + per_page as u64 - 1) / per_page as u64) as u32;
        let data = items
            .into_iter()
            .skip(pagination.offset())
            .take(per_page as usize)
            .collect();

        Self {
            data,
            pagination: PaginationMeta {
                page: pagination.page,
                per_page,
                total_items,
                total_pages,
            },
        }
    }
}
