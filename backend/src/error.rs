//! Error handling for the Fertilizer Procurement Platform
//!
//! Every failure surfaced by the services maps to a stable upper-snake code
//! and a serializable `ErrorResponse`.

use serde::Serialize;
use shared::{CalculationError, GraphError, TransitionError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    #[error("Inconsistent data: {0}")]
    InconsistentData(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{entity} {id}"))
    }

    pub fn validation(field: &str, message: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientPermissions(_) => "INSUFFICIENT_PERMISSIONS",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::Calculation(CalculationError::MissingReference { .. }) => "MISSING_REFERENCE",
            AppError::Calculation(CalculationError::DivisionByZero { .. }) => "DIVISION_BY_ZERO",
            AppError::Calculation(CalculationError::ForeignRecord { .. }) => "FOREIGN_RECORD",
            AppError::InconsistentData(_) => "INCONSISTENT_DATA",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (message, field) = match self {
            AppError::NotFound(resource) => (format!("{resource} not found"), None),
            AppError::Validation { field, message } => (message.clone(), Some(field.clone())),
            // connection strings and driver details stay in the logs
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
            AppError::Internal(_) => ("An internal error occurred".to_string(), None),
            AppError::InsufficientPermissions(msg)
            | AppError::InvalidStateTransition(msg)
            | AppError::InconsistentData(msg)
            | AppError::Configuration(msg) => (msg.clone(), None),
            AppError::Calculation(err) => (err.to_string(), None),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                field,
            },
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotPermitted { .. } => AppError::InsufficientPermissions(err.to_string()),
            TransitionError::InvalidState { .. } => AppError::InvalidStateTransition(err.to_string()),
        }
    }
}

impl From<GraphError> for AppError {
    fn from(err: GraphError) -> Self {
        AppError::InconsistentData(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Action, RecordStatus};

    #[test]
    fn test_transition_errors_map_to_codes() {
        let denied: AppError = TransitionError::NotPermitted {
            entity: "batch",
            action: Action::Reopen,
            role: "Staff".to_string(),
        }
        .into();
        assert_eq!(denied.code(), "INSUFFICIENT_PERMISSIONS");
        assert_eq!(denied.to_response().error.message, "Staff may not reopen a batch");

        let invalid: AppError = TransitionError::InvalidState {
            entity: "batch",
            action: Action::Delete,
            status: RecordStatus::Open,
        }
        .into();
        assert_eq!(invalid.code(), "INVALID_STATE_TRANSITION");
    }

    #[test]
    fn test_calculation_error_codes() {
        let err = AppError::from(CalculationError::DivisionByZero {
            context: "delivered retention",
        });
        assert_eq!(err.code(), "DIVISION_BY_ZERO");
        assert_eq!(
            err.to_response().error.message,
            "division by zero: delivered retention is zero"
        );
    }

    #[test]
    fn test_validation_response_carries_field() {
        let response = AppError::validation("rate", "Batch rate cannot be negative").to_response();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["field"], "rate");
    }

    #[test]
    fn test_not_found_omits_field() {
        let json = serde_json::to_value(AppError::NotFound("batch 42".into()).to_response()).unwrap();
        assert_eq!(json["error"]["message"], "batch 42 not found");
        assert!(json["error"].get("field").is_none());
    }
}
