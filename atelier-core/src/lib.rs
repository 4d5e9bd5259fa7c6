pub mod notify;
pub mod pagination;
pub mod payment;
pub mod status;

use uuid::Uuid;

pub use notify::{NotificationDispatcher, Notifier};
pub use pagination::{Page, PageRequest};
pub use payment::{PaymentMethod, PaymentStatus};
pub use status::OrderStatus;

/// Failure taxonomy shared by every service in the workspace.
///
/// None of these are retried: they all describe a violated precondition, except
/// `InternalError` which wraps store or transport faults.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Line {line}: {name} is unavailable ({reason})")]
    UnavailableError {
        line: usize,
        item_id: Uuid,
        name: String,
        reason: String,
    },
    #[error("Line {line}: insufficient stock for {name} (requested {requested}, available {available})")]
    InsufficientStockError {
        line: usize,
        item_id: Uuid,
        name: String,
        requested: u32,
        available: u32,
    },
    #[error("Invalid state: {0}")]
    StateError(String),
    #[error("Conflict: {0}")]
    ConflictError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    /// Stable machine-readable kind, surfaced to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::ValidationError(_) => "VALIDATION_ERROR",
            CoreError::NotFoundError(_) => "NOT_FOUND",
            CoreError::UnavailableError { .. } => "UNAVAILABLE",
            CoreError::InsufficientStockError { .. } => "INSUFFICIENT_STOCK",
            CoreError::StateError(_) => "STATE_ERROR",
            CoreError::ConflictError(_) => "CONFLICT",
            CoreError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        CoreError::InternalError(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
