// src/ledger/validation.rs
//! Acceptance rules for production entries.

use std::collections::HashMap;
use std::str::FromStr;

use super::error::{LedgerError, LedgerResult};
use super::process::{Process, ProductionStatus};

pub const QUANTITY_FIELD: &str = "quantity_produced";

// ==================== TOLERANCE ====================

/// Per-stage slack allowed above the remaining quantity for `ok` entries.
/// Stages without an entry get zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TolerancePolicy {
    slack: HashMap<Process, i64>,
}

impl TolerancePolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, process: Process, slack: i64) -> Self {
        self.slack.insert(process, slack.max(0));
        self
    }

    /// Builds the policy from config keys such as `"heat_treatment" = 100`.
    pub fn from_config(tolerances: &HashMap<String, i64>) -> Result<Self, String> {
        let mut policy = Self::none();
        for (name, slack) in tolerances {
            let process = Process::from_str(name)
                .map_err(|_| format!("Unknown process '{}' in ledger tolerances", name))?;
            if *slack < 0 {
                return Err(format!("Tolerance for '{}' cannot be negative", name));
            }
            policy = policy.with(process, *slack);
        }
        Ok(policy)
    }

    pub fn for_process(&self, process: Process) -> i64 {
        self.slack.get(&process).copied().unwrap_or(0)
    }
}

// ==================== QUANTITY ====================

/// Entries count whole pieces.
pub fn parse_pieces(field: &'static str, raw: f64) -> LedgerResult<i64> {
    if !raw.is_finite() {
        return Err(LedgerError::InvalidQuantity { field, reason: "must be a number".to_string() });
    }
    if raw < 0.0 {
        return Err(LedgerError::InvalidQuantity { field, reason: "cannot be negative".to_string() });
    }
    if raw.fract() != 0.0 {
        return Err(LedgerError::InvalidQuantity { field, reason: "must be a whole number of pieces".to_string() });
    }
    if raw == 0.0 {
        return Err(LedgerError::InvalidQuantity { field, reason: "must be at least 1".to_string() });
    }
    if raw > i32::MAX as f64 {
        return Err(LedgerError::InvalidQuantity { field, reason: "is too large".to_string() });
    }
    Ok(raw as i64)
}

// ==================== VALIDATOR ====================

#[derive(Debug, Clone, Copy)]
pub struct ProductionValidator {
    process: Process,
    tolerance: i64,
}

impl ProductionValidator {
    pub fn new(process: Process, policy: &TolerancePolicy) -> Self {
        Self { process, tolerance: policy.for_process(process) }
    }

    pub fn tolerance(&self) -> i64 {
        self.tolerance
    }

    /// Returns the accepted piece count.
    ///
    /// `reject` and `rework` entries book pieces out of a separate bucket and
    /// are accepted whatever the remaining quantity.
    pub fn check(&self, raw_quantity: f64, remaining: i64, status: ProductionStatus) -> LedgerResult<i64> {
        let quantity = parse_pieces(QUANTITY_FIELD, raw_quantity)?;

        if !status.advances() {
            return Ok(quantity);
        }
        if remaining <= 0 {
            return Err(LedgerError::NoRemainingQuantity { process: self.process });
        }
        if quantity > remaining + self.tolerance {
            return Err(LedgerError::QuantityExceeded {
                field: QUANTITY_FIELD,
                requested: quantity,
                remaining,
                tolerance: self.tolerance,
            });
        }
        Ok(quantity)
    }
}
