// src/ledger/error.rs
//! Error taxonomy of the batch production ledger.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::process::Process;
use super::rows::RowId;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failures of ledger reads and commands. All of them are per-operation and
/// recoverable by the operator.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{field}: requested {requested} exceeds remaining {remaining} (tolerance {tolerance})")]
    QuantityExceeded {
        field: &'static str,
        requested: i64,
        remaining: i64,
        tolerance: i64,
    },

    #[error("{field}: {reason}")]
    InvalidQuantity { field: &'static str, reason: String },

    #[error("no remaining quantity for {process}")]
    NoRemainingQuantity { process: Process },

    /// The batch resolved but its remaining quantity was never read.
    #[error("remaining quantity of '{batch_id}' is not loaded; reload it before submitting")]
    RemainingNotLoaded { batch_id: String },

    #[error("invalid transition from {from}{}: {reason}", transition_target(.to))]
    InvalidTransition {
        from: Process,
        to: Option<Process>,
        reason: String,
    },

    #[error("a child component of '{parent}' must be selected ({})", .choices.join(", "))]
    ComponentNotSelected { parent: String, choices: Vec<String> },

    #[error("{} row(s) rejected", .0.len())]
    RowsRejected(Vec<RowError>),

    #[error("request rejected ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("storage error: {0}")]
    Storage(String),
}

fn transition_target(to: &Option<Process>) -> String {
    to.map(|p| format!(" to {}", p)).unwrap_or_default()
}

impl LedgerError {
    pub fn batch_not_found(batch_id: &str) -> Self {
        LedgerError::NotFound { entity: "batch", id: batch_id.to_string() }
    }

    pub fn component_not_found(component: &str) -> Self {
        LedgerError::NotFound { entity: "component", id: component.to_string() }
    }

    /// Stable machine-readable code, echoed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "not_found",
            LedgerError::QuantityExceeded { .. } => "quantity_exceeded",
            LedgerError::InvalidQuantity { .. } => "invalid_quantity",
            LedgerError::NoRemainingQuantity { .. } => "no_remaining_quantity",
            LedgerError::RemainingNotLoaded { .. } => "remaining_not_loaded",
            LedgerError::InvalidTransition { .. } => "invalid_transition",
            LedgerError::ComponentNotSelected { .. } => "component_not_selected",
            LedgerError::RowsRejected(_) => "rows_rejected",
            LedgerError::Remote { .. } => "remote_rejected",
            LedgerError::NetworkFailure(_) => "network_failure",
            LedgerError::Storage(_) => "storage_error",
        }
    }

    /// Form field the failure belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            LedgerError::NotFound { entity: "component", .. } => "component",
            LedgerError::NotFound { entity: "row", .. } => "row",
            LedgerError::NotFound { .. } => "batch_id",
            LedgerError::QuantityExceeded { field, .. } => *field,
            LedgerError::InvalidQuantity { field, .. } => *field,
            LedgerError::NoRemainingQuantity { .. } | LedgerError::RemainingNotLoaded { .. } => {
                "quantity_produced"
            }
            LedgerError::InvalidTransition { .. } => "next_process",
            LedgerError::ComponentNotSelected { .. } => "component",
            _ => "",
        }
    }

    /// Business rule violations, as opposed to lookup, transport or storage failures.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            LedgerError::QuantityExceeded { .. }
                | LedgerError::InvalidQuantity { .. }
                | LedgerError::NoRemainingQuantity { .. }
                | LedgerError::InvalidTransition { .. }
                | LedgerError::ComponentNotSelected { .. }
                | LedgerError::RowsRejected(_)
        )
    }

    /// The operator may simply resubmit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::NetworkFailure(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

/// One rejected row of a multi-row submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: RowId,
    pub field: String,
    pub code: String,
    pub message: String,
}

impl RowError {
    pub fn from_ledger(row: RowId, err: &LedgerError) -> Self {
        Self {
            row,
            field: err.field().to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
