//! Errors raised by the settlement engine and lifecycle transitions

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Action, Role};
use crate::types::RecordStatus;

/// Failures of a rollup over an object graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalculationError {
    /// A required parent reference is unset (e.g. an order without a batch)
    #[error("{entity} has no {reference}")]
    MissingReference {
        entity: &'static str,
        reference: &'static str,
    },

    /// The denominator total of a share is zero
    #[error("division by zero: {context} is zero")]
    DivisionByZero { context: &'static str },

    /// A child record was evaluated against an order it does not belong to
    #[error("{entity} {id} does not belong to the given delivery order")]
    ForeignRecord { entity: &'static str, id: Uuid },
}

/// Rejected status changes
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{role} may not {action} a {entity}")]
    NotPermitted {
        entity: &'static str,
        action: Action,
        role: String,
    },

    #[error("cannot {action} a {entity} that is {status}")]
    InvalidState {
        entity: &'static str,
        action: Action,
        status: RecordStatus,
    },
}

impl TransitionError {
    pub(crate) fn not_permitted(entity: &'static str, action: Action, role: Option<Role>) -> Self {
        TransitionError::NotPermitted {
            entity,
            action,
            role: role.map_or_else(|| "user without a role".to_string(), |r| r.to_string()),
        }
    }
}

/// Structural violations when assembling an object graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("delivery order {delivery_order_id} already has an {record} for buyer {buyer_id}")]
    DuplicateBuyer {
        record: &'static str,
        delivery_order_id: Uuid,
        buyer_id: Uuid,
    },

    #[error("{entity} {id} references missing {reference} {reference_id}")]
    DanglingReference {
        entity: &'static str,
        id: Uuid,
        reference: &'static str,
        reference_id: Uuid,
    },
}

/// Result type for engine calculations
pub type CalcResult<T> = Result<T, CalculationError>;
